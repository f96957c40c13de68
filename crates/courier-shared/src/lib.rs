//! # courier-shared
//!
//! Types shared by the gate nodes and the logic tier: the binary packet
//! codec spoken over client sockets, the typed request/response bodies,
//! and the closed dispatch enum the gate uses to route inbound packets.

pub mod constants;
pub mod messages;
pub mod protocol;
pub mod request;
pub mod status;
pub mod types;

mod error;

pub use error::CodecError;
pub use protocol::{Command, Packet};
pub use request::ClientRequest;
pub use types::{ConnId, UserId};
