//! Domain model structs persisted in the database.

use serde::{Deserialize, Serialize};

use courier_shared::types::MessageKind;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message as submitted by the sender, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage<'a> {
    pub from: &'a str,
    /// Recipient user id, or group id for group messages.
    pub to: &'a str,
    pub content: &'a str,
    pub seq: i64,
    /// Sender-reported send time (unix millis).
    pub send_time: i64,
    pub kind: MessageKind,
}

/// A persisted message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned, strictly increasing.
    pub msg_id: i64,
    pub from: String,
    pub to: String,
    pub seq: i64,
    pub content: String,
    pub send_time: i64,
    pub kind: MessageKind,
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// Per-recipient read marker for a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub msg_id: i64,
    pub from: String,
    pub to: String,
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Where a user's live connection currently is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceEntry {
    pub uid: String,
    pub gate_addr: String,
}
