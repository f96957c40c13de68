//! Presence directory rows: which gate node holds each online user.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Record (or overwrite) the gate address for `uid`. Last writer wins.
    pub fn set_presence(&self, uid: &str, gate_addr: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO presence (uid, gate_addr, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET gate_addr = excluded.gate_addr,
                                            updated_at = excluded.updated_at",
            params![uid, gate_addr, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_presence(&self, uid: &str) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT gate_addr FROM presence WHERE uid = ?1",
                params![uid],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Remove `uid` from the directory if it still points at `gate_addr`.
    /// Returns whether an entry was removed.
    pub fn delete_presence(&self, uid: &str, gate_addr: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM presence WHERE uid = ?1 AND gate_addr = ?2",
            params![uid, gate_addr],
        )?;
        Ok(affected > 0)
    }

    pub fn presence_exists(&self, uid: &str) -> Result<bool> {
        Ok(self.get_presence(uid)?.is_some())
    }
}
