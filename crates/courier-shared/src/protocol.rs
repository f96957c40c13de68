//! Binary packet framing for the client socket.
//!
//! Every packet is a fixed 12-byte header (`version`, `command`,
//! `body_len`, each a big-endian `u32`) followed by exactly `body_len`
//! bytes of opaque body. The codec never looks inside the body; higher
//! layers interpret it according to `command`.

use std::io::{ErrorKind, Read};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::{HEADER_LEN, MAX_BODY_LEN};
use crate::error::CodecError;

/// Command tag carried in the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    HeartBeatRequest = 0,
    HeartBeatResponse = 1,
    AuthRequest = 2,
    AuthResponse = 3,
    /// Client logout; also the tag used for a server-initiated kick-out push.
    LogoutRequest = 4,
    LogoutResponse = 5,
    C2CSendRequest = 6,
    C2CSendResponse = 7,
    C2CPushRequest = 8,
    /// Client acknowledgment of a one-to-one push.
    C2CPushResponse = 9,
    C2GSendRequest = 10,
    C2GSendResponse = 11,
    C2GPushRequest = 12,
    /// Client acknowledgment of a group push.
    C2GPushResponse = 13,
    PullRequest = 14,
    PullResponse = 15,
}

impl Command {
    pub fn from_u32(value: u32) -> Option<Self> {
        let cmd = match value {
            0 => Self::HeartBeatRequest,
            1 => Self::HeartBeatResponse,
            2 => Self::AuthRequest,
            3 => Self::AuthResponse,
            4 => Self::LogoutRequest,
            5 => Self::LogoutResponse,
            6 => Self::C2CSendRequest,
            7 => Self::C2CSendResponse,
            8 => Self::C2CPushRequest,
            9 => Self::C2CPushResponse,
            10 => Self::C2GSendRequest,
            11 => Self::C2GSendResponse,
            12 => Self::C2GPushRequest,
            13 => Self::C2GPushResponse,
            14 => Self::PullRequest,
            15 => Self::PullResponse,
            _ => return None,
        };
        Some(cmd)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One framed unit on the client socket.
///
/// `command` is kept as a raw `u32` so packets with tags this node does
/// not understand still decode; the dispatcher decides what to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u32,
    pub command: u32,
    body: Bytes,
}

impl Packet {
    pub fn new(version: u32, command: u32, body: impl Into<Bytes>) -> Self {
        Self {
            version,
            command,
            body: body.into(),
        }
    }

    /// A packet with no body (heartbeats).
    pub fn empty(version: u32, command: Command) -> Self {
        Self::new(version, command.as_u32(), Bytes::new())
    }

    /// Serialize `message` with bincode and wrap it in a packet.
    pub fn with_message<T: Serialize>(
        version: u32,
        command: Command,
        message: &T,
    ) -> Result<Self, CodecError> {
        let body = bincode::serialize(message)?;
        Ok(Self::new(version, command.as_u32(), body))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_len(&self) -> u32 {
        self.body.len() as u32
    }

    /// The header tag as a known [`Command`], if it is one.
    pub fn command(&self) -> Option<Command> {
        Command::from_u32(self.command)
    }

    /// Deserialize the body as `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(bincode::deserialize(&self.body)?)
    }

    /// Header followed by body, ready to be written to the socket.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len());
        buf.put_u32(self.version);
        buf.put_u32(self.command);
        buf.put_u32(self.body_len());
        buf.put_slice(&self.body);
        buf.freeze()
    }

    /// Read exactly one packet from `reader`.
    ///
    /// Fails with [`CodecError::TruncatedStream`] if the stream ends before
    /// the header or the declared body is complete.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, CodecError> {
        let mut header = [0u8; HEADER_LEN];
        read_full(reader, &mut header)?;

        let mut cursor = &header[..];
        let version = cursor.get_u32();
        let command = cursor.get_u32();
        let body_len = cursor.get_u32();

        if body_len > MAX_BODY_LEN {
            return Err(CodecError::BodyTooLarge {
                len: body_len,
                max: MAX_BODY_LEN,
            });
        }

        let mut body = vec![0u8; body_len as usize];
        read_full(reader, &mut body)?;

        Ok(Self::new(version, command, body))
    }
}

/// Encode `message` (or an empty body) under `command`.
pub fn encode<T: Serialize>(
    version: u32,
    command: Command,
    message: Option<&T>,
) -> Result<Bytes, CodecError> {
    let packet = match message {
        Some(message) => Packet::with_message(version, command, message)?,
        None => Packet::empty(version, command),
    };
    Ok(packet.to_bytes())
}

/// Decode one packet from `reader`. See [`Packet::decode`].
pub fn decode<R: Read>(reader: &mut R) -> Result<Packet, CodecError> {
    Packet::decode(reader)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(CodecError::TruncatedStream {
                    expected: buf.len(),
                    got: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(())
}
