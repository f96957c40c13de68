//! Closed dispatch over the client-to-server command set.

use crate::error::CodecError;
use crate::messages::{
    AuthRequest, C2CPushResponse, C2CSendRequest, C2GPushResponse, C2GSendRequest,
    LogoutRequest, PullRequest,
};
use crate::protocol::{Command, Packet};

/// A decoded client request, one variant per command the gate handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    HeartBeat,
    Auth(AuthRequest),
    Logout(LogoutRequest),
    C2CSend(C2CSendRequest),
    C2GSend(C2GSendRequest),
    Pull(PullRequest),
    C2CPushAck(C2CPushResponse),
    C2GPushAck(C2GPushResponse),
}

impl ClientRequest {
    /// Interpret `packet` by its command tag.
    ///
    /// Returns `Ok(None)` for tags that are unknown or not client requests;
    /// callers ignore those.
    pub fn from_packet(packet: &Packet) -> Result<Option<Self>, CodecError> {
        let Some(command) = packet.command() else {
            return Ok(None);
        };

        let request = match command {
            Command::HeartBeatRequest => Self::HeartBeat,
            Command::AuthRequest => Self::Auth(packet.body_as()?),
            Command::LogoutRequest => Self::Logout(packet.body_as()?),
            Command::C2CSendRequest => Self::C2CSend(packet.body_as()?),
            Command::C2GSendRequest => Self::C2GSend(packet.body_as()?),
            Command::PullRequest => Self::Pull(packet.body_as()?),
            Command::C2CPushResponse => Self::C2CPushAck(packet.body_as()?),
            Command::C2GPushResponse => Self::C2GPushAck(packet.body_as()?),
            _ => return Ok(None),
        };
        Ok(Some(request))
    }

    /// The command a response to this request is sent under, if any.
    pub fn response_command(&self) -> Option<Command> {
        match self {
            Self::HeartBeat => Some(Command::HeartBeatResponse),
            Self::Auth(_) => Some(Command::AuthResponse),
            Self::Logout(_) => Some(Command::LogoutResponse),
            Self::C2CSend(_) => Some(Command::C2CSendResponse),
            Self::C2GSend(_) => Some(Command::C2GSendResponse),
            Self::Pull(_) => Some(Command::PullResponse),
            Self::C2CPushAck(_) | Self::C2GPushAck(_) => None,
        }
    }
}
