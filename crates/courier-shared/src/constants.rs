/// Protocol version carried in every packet header.
pub const V1: u32 = 0;

/// Fixed packet header size in bytes (version, command, body length).
pub const HEADER_LEN: usize = 12;

/// Largest body a peer may declare (64 KiB).
pub const MAX_BODY_LEN: u32 = 64 * 1024;

/// Time allowed to write one frame to the peer (seconds).
pub const WRITE_WAIT_SECS: u64 = 10;

/// Time allowed between two inbound frames before the peer is considered gone (seconds).
pub const PONG_WAIT_SECS: u64 = 60;

/// Keep-alive ping period; must stay below `PONG_WAIT_SECS`.
pub const PING_PERIOD_SECS: u64 = PONG_WAIT_SECS * 9 / 10;

/// Capacity of a session's outbound frame queue.
pub const OUTBOUND_QUEUE_LEN: usize = 256;

/// Longest accepted user identity, in characters.
pub const MAX_UID_LEN: usize = 64;

/// Header carrying the gate node's advertised push address on routing RPCs.
pub const GATE_ADDR_HEADER: &str = "x-gate-addr";

/// Default gate push RPC port.
pub const DEFAULT_PUSH_PORT: u16 = 9000;

/// Default logic tier RPC port.
pub const DEFAULT_LOGIC_PORT: u16 = 8090;
