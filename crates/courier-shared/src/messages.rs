//! Typed packet bodies and routing/push RPC payloads.
//!
//! The same structs travel as bincode inside client packets and as JSON
//! on the RPC links between gate nodes and the logic tier. Timestamps are
//! Unix milliseconds.

use serde::{Deserialize, Serialize};

use crate::status::STATUS_OK;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Auth / logout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub uid: String,
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: i32,
    pub msg: String,
    pub ts: i64,
    pub seq: i64,
}

impl AuthResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub uid: String,
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub ts: i64,
    pub seq: i64,
}

// ---------------------------------------------------------------------------
// One-to-one
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2CSendRequest {
    pub from: String,
    pub to: String,
    pub content: String,
    pub seq: i64,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2CSendResponse {
    pub status: i32,
    /// Store-assigned id, 0 when nothing was persisted.
    pub msg_id: i64,
    pub ts: i64,
    pub seq: i64,
}

/// Server-initiated delivery of a one-to-one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2CPushRequest {
    pub from: String,
    pub to: String,
    pub seq: i64,
    pub content: String,
    pub msg_id: i64,
    pub ts: i64,
}

/// Client acknowledgment of a [`C2CPushRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2CPushResponse {
    pub msg_id: i64,
    pub seq: i64,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2GSendRequest {
    pub from: String,
    pub group: String,
    pub content: String,
    pub seq: i64,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2GSendResponse {
    pub status: i32,
    pub msg_id: i64,
    pub ts: i64,
    pub seq: i64,
}

/// Server-initiated delivery of a group message to one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2GPushRequest {
    pub from: String,
    pub to: String,
    pub seq: i64,
    pub group: String,
    pub content: String,
    pub msg_id: i64,
    pub ts: i64,
}

/// Client acknowledgment of a [`C2GPushRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2GPushResponse {
    pub msg_id: i64,
    pub seq: i64,
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub uid: String,
    /// Return only messages with an id above this one; 0 means from the start.
    pub msg_id: i64,
    /// Maximum number of messages; 0 means unbounded.
    pub limit: u32,
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullMsg {
    pub msg_id: i64,
    pub seq: i64,
    pub from: String,
    /// Set for group messages.
    pub group: Option<String>,
    pub content: String,
    pub send_time: i64,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    pub ts: i64,
    pub seq: i64,
    pub msgs: Vec<PullMsg>,
}

// ---------------------------------------------------------------------------
// Acks and push RPC
// ---------------------------------------------------------------------------

/// Routing RPC payload for a push acknowledgment. `uid` is stamped by the
/// gate from the session that sent the ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckRequest {
    pub uid: String,
    pub msg_id: i64,
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub ts: i64,
    pub seq: i64,
}

/// Forced disconnection of a user from its gate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickOutRequest {
    pub uid: String,
    pub reason: i32,
    pub ts: i64,
}

/// Returned by every push RPC as soon as the push is queued on the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    pub ts: i64,
}

impl PushAck {
    pub fn now() -> Self {
        Self { ts: now_millis() }
    }
}

// ---------------------------------------------------------------------------
// Group membership (provisioning RPC, not part of the client protocol)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberRequest {
    pub group: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberResponse {
    pub status: i32,
    /// Whether membership actually changed.
    pub changed: bool,
    pub ts: i64,
}
