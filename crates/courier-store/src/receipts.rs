use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::messages::row_to_message;
use crate::models::Message;
#[cfg(any(test, feature = "test-support"))]
use crate::{error::StoreError, models::Receipt};

impl Database {
    /// Record that `to` should receive message `msg_id`. Inserting the same
    /// receipt twice is a no-op.
    pub fn insert_receipt(&self, from: &str, to: &str, msg_id: i64) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO receipts (msg_id, msg_from, msg_to, is_read)
             VALUES (?1, ?2, ?3, 0)",
            params![msg_id, from, to],
        )?;
        Ok(())
    }

    /// Flip `uid`'s receipt for `msg_id` to read. Returns whether a row changed.
    pub fn mark_read(&self, msg_id: i64, uid: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE receipts SET is_read = 1 WHERE msg_id = ?1 AND msg_to = ?2 AND is_read = 0",
            params![msg_id, uid],
        )?;
        Ok(affected > 0)
    }

    /// Unread messages addressed to `uid` with an id above `after_msg_id`,
    /// oldest first. `limit == 0` means no limit.
    pub fn unread_for(&self, uid: &str, after_msg_id: i64, limit: u32) -> Result<Vec<Message>> {
        let limit: i64 = if limit == 0 { -1 } else { i64::from(limit) };

        let mut stmt = self.conn().prepare(
            "SELECT m.msg_id, m.msg_from, m.msg_to, m.msg_seq, m.msg_content, m.send_time, m.msg_type
             FROM receipts r
             JOIN messages m ON m.msg_id = r.msg_id
             WHERE r.msg_to = ?1 AND r.is_read = 0 AND r.msg_id > ?2
             ORDER BY r.msg_id ASC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![uid, after_msg_id, limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn get_receipt(&self, msg_id: i64, uid: &str) -> Result<Receipt> {
        self.conn()
            .query_row(
                "SELECT msg_id, msg_from, msg_to, is_read FROM receipts
                 WHERE msg_id = ?1 AND msg_to = ?2",
                params![msg_id, uid],
                |row| {
                    Ok(Receipt {
                        msg_id: row.get(0)?,
                        from: row.get(1)?,
                        to: row.get(2)?,
                        read: row.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All receipts recorded for `msg_id`.
    #[cfg(any(test, feature = "test-support"))]
    pub fn receipts_for_message(&self, msg_id: i64) -> Result<Vec<Receipt>> {
        let mut stmt = self.conn().prepare(
            "SELECT msg_id, msg_from, msg_to, is_read FROM receipts
             WHERE msg_id = ?1 ORDER BY msg_to",
        )?;
        let rows = stmt.query_map(params![msg_id], |row| {
            Ok(Receipt {
                msg_id: row.get(0)?,
                from: row.get(1)?,
                to: row.get(2)?,
                read: row.get::<_, i64>(3)? != 0,
            })
        })?;

        let mut receipts = Vec::new();
        for row in rows {
            receipts.push(row?);
        }
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use courier_shared::types::MessageKind;

    fn send(db: &Database, from: &str, to: &str, content: &str) -> i64 {
        let id = db
            .insert_message(&NewMessage {
                from,
                to,
                content,
                seq: 1,
                send_time: 0,
                kind: MessageKind::C2C,
            })
            .unwrap();
        db.insert_receipt(from, to, id).unwrap();
        id
    }

    #[test]
    fn test_unread_ordering_and_cursor() {
        let db = Database::open_in_memory().unwrap();
        let a = send(&db, "alice", "bob", "a");
        let b = send(&db, "alice", "bob", "b");
        let c = send(&db, "carol", "bob", "c");
        send(&db, "alice", "dave", "not for bob");

        let all = db.unread_for("bob", 0, 0).unwrap();
        let ids: Vec<i64> = all.iter().map(|m| m.msg_id).collect();
        assert_eq!(ids, vec![a, b, c]);

        let after_a = db.unread_for("bob", a, 0).unwrap();
        assert_eq!(after_a.len(), 2);

        let limited = db.unread_for("bob", 0, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].msg_id, a);
    }

    #[test]
    fn test_mark_read_hides_from_unread() {
        let db = Database::open_in_memory().unwrap();
        let id = send(&db, "alice", "bob", "hi");

        assert!(db.mark_read(id, "bob").unwrap());
        assert!(!db.mark_read(id, "bob").unwrap());
        assert!(db.get_receipt(id, "bob").unwrap().read);
        assert!(db.unread_for("bob", 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_is_per_recipient() {
        let db = Database::open_in_memory().unwrap();
        let id = send(&db, "alice", "bob", "group hello");
        db.insert_receipt("alice", "carol", id).unwrap();

        db.mark_read(id, "bob").unwrap();

        let receipts = db.receipts_for_message(id).unwrap();
        assert_eq!(receipts.len(), 2);
        assert!(receipts.iter().find(|r| r.to == "bob").unwrap().read);
        assert!(!receipts.iter().find(|r| r.to == "carol").unwrap().read);
    }
}
