//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `messages`, `receipts`, `group_members`,
//! and `presence`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages (one row per send, one-to-one or group)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    msg_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    msg_from    TEXT NOT NULL,
    msg_to      TEXT NOT NULL,                -- user id or group id
    msg_seq     INTEGER NOT NULL,
    msg_content TEXT NOT NULL,
    send_time   INTEGER NOT NULL,             -- unix millis, sender clock
    msg_type    INTEGER NOT NULL              -- 0 = C2C, 1 = C2G
);

-- ----------------------------------------------------------------
-- Receipts (one row per intended recipient)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS receipts (
    msg_id   INTEGER NOT NULL,
    msg_from TEXT NOT NULL,
    msg_to   TEXT NOT NULL,
    is_read  INTEGER NOT NULL DEFAULT 0,      -- boolean 0/1

    PRIMARY KEY (msg_id, msg_to),
    FOREIGN KEY (msg_id) REFERENCES messages(msg_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_receipts_unread
    ON receipts(msg_to, is_read, msg_id);

-- ----------------------------------------------------------------
-- Group membership
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL,
    uid      TEXT NOT NULL,

    PRIMARY KEY (group_id, uid)
);

-- ----------------------------------------------------------------
-- Presence (user -> gate node push address)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS presence (
    uid        TEXT PRIMARY KEY NOT NULL,
    gate_addr  TEXT NOT NULL,
    updated_at TEXT NOT NULL                  -- RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
