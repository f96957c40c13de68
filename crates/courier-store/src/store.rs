//! Thread-safe store handle and the seams the routing service depends on.

use std::path::Path;
use std::sync::Mutex;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, NewMessage};

/// Durable message, receipt, and membership storage.
pub trait MessageStore: Send + Sync {
    /// Persist a message with one unread receipt per recipient, all or
    /// nothing, and return its assigned id.
    fn save_message(&self, message: &NewMessage<'_>, recipients: &[String]) -> Result<i64>;

    /// Mark `uid`'s receipt for `msg_id` read.
    fn mark_read(&self, msg_id: i64, uid: &str) -> Result<bool>;

    /// Unread messages for `uid` above `after_msg_id`, ascending; `limit == 0` is unbounded.
    fn unread_for(&self, uid: &str, after_msg_id: i64, limit: u32) -> Result<Vec<Message>>;

    fn group_members(&self, group_id: &str) -> Result<Vec<String>>;

    /// Returns whether `uid` was newly added.
    fn add_group_member(&self, group_id: &str, uid: &str) -> Result<bool>;

    /// Returns whether `uid` was a member.
    fn remove_group_member(&self, group_id: &str, uid: &str) -> Result<bool>;
}

/// Shared user -> gate address directory.
pub trait PresenceDirectory: Send + Sync {
    fn set(&self, uid: &str, gate_addr: &str) -> Result<()>;

    fn get(&self, uid: &str) -> Result<Option<String>>;

    /// Remove `uid` only while it still maps to `gate_addr`, so a newer
    /// registration elsewhere survives. Returns whether an entry was removed.
    fn delete(&self, uid: &str, gate_addr: &str) -> Result<bool>;

    fn exists(&self, uid: &str) -> Result<bool> {
        Ok(self.get(uid)?.is_some())
    }
}

/// [`Database`] behind a mutex, shareable across tasks.
pub struct Store {
    db: Mutex<Database>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` with exclusive access to the database.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&db)
    }
}

impl MessageStore for Store {
    fn save_message(&self, message: &NewMessage<'_>, recipients: &[String]) -> Result<i64> {
        self.with_db(|db| db.insert_message_with_receipts(message, recipients))
    }

    fn mark_read(&self, msg_id: i64, uid: &str) -> Result<bool> {
        self.with_db(|db| db.mark_read(msg_id, uid))
    }

    fn unread_for(&self, uid: &str, after_msg_id: i64, limit: u32) -> Result<Vec<Message>> {
        self.with_db(|db| db.unread_for(uid, after_msg_id, limit))
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<String>> {
        self.with_db(|db| db.group_members(group_id))
    }

    fn add_group_member(&self, group_id: &str, uid: &str) -> Result<bool> {
        self.with_db(|db| db.add_group_member(group_id, uid))
    }

    fn remove_group_member(&self, group_id: &str, uid: &str) -> Result<bool> {
        self.with_db(|db| db.remove_group_member(group_id, uid))
    }
}

impl PresenceDirectory for Store {
    fn set(&self, uid: &str, gate_addr: &str) -> Result<()> {
        self.with_db(|db| db.set_presence(uid, gate_addr))
    }

    fn get(&self, uid: &str) -> Result<Option<String>> {
        self.with_db(|db| db.get_presence(uid))
    }

    fn delete(&self, uid: &str, gate_addr: &str) -> Result<bool> {
        self.with_db(|db| db.delete_presence(uid, gate_addr))
    }

    fn exists(&self, uid: &str) -> Result<bool> {
        self.with_db(|db| db.presence_exists(uid))
    }
}
