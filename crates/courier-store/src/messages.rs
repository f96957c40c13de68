use rusqlite::params;

use courier_shared::types::MessageKind;

use crate::database::Database;
use crate::error::Result;
#[cfg(any(test, feature = "test-support"))]
use crate::error::StoreError;
use crate::models::{Message, NewMessage};

impl Database {
    /// Persist a message and return the id the store assigned to it.
    pub fn insert_message(&self, message: &NewMessage<'_>) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO messages (msg_from, msg_to, msg_seq, msg_content, send_time, msg_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.from,
                message.to,
                message.seq,
                message.content,
                message.send_time,
                message.kind as u8,
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Persist a message together with an unread receipt for each of
    /// `recipients`, atomically. On error nothing is stored.
    pub fn insert_message_with_receipts(
        &self,
        message: &NewMessage<'_>,
        recipients: &[String],
    ) -> Result<i64> {
        let tx = self.conn().unchecked_transaction()?;
        let msg_id = self.insert_message(message)?;
        for to in recipients {
            self.insert_receipt(message.from, to, msg_id)?;
        }
        tx.commit()?;
        Ok(msg_id)
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn get_message(&self, msg_id: i64) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT msg_id, msg_from, msg_to, msg_seq, msg_content, send_time, msg_type
                 FROM messages WHERE msg_id = ?1",
                params![msg_id],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn message_count(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?)
    }
}

/// Map a `msg_id, msg_from, msg_to, msg_seq, msg_content, send_time, msg_type` row.
pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind_raw: i64 = row.get(6)?;
    let kind = u8::try_from(kind_raw)
        .ok()
        .and_then(MessageKind::from_byte)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(6, kind_raw))?;

    Ok(Message {
        msg_id: row.get(0)?,
        from: row.get(1)?,
        to: row.get(2)?,
        seq: row.get(3)?,
        content: row.get(4)?,
        send_time: row.get(5)?,
        kind,
    })
}
