use rusqlite::params;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Members of `group_id`, sorted by user id.
    pub fn group_members(&self, group_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT uid FROM group_members WHERE group_id = ?1 ORDER BY uid")?;
        let rows = stmt.query_map(params![group_id], |row| row.get(0))?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Returns whether `uid` was newly added.
    pub fn add_group_member(&self, group_id: &str, uid: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO group_members (group_id, uid) VALUES (?1, ?2)",
            params![group_id, uid],
        )?;
        Ok(affected > 0)
    }

    pub fn remove_group_member(&self, group_id: &str, uid: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND uid = ?2",
            params![group_id, uid],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let db = Database::open_in_memory().unwrap();
        db.add_group_member("room", "bob").unwrap();
        assert!(db.add_group_member("room", "alice").unwrap());
        assert!(!db.add_group_member("room", "alice").unwrap());
        db.add_group_member("other", "carol").unwrap();

        assert_eq!(db.group_members("room").unwrap(), vec!["alice", "bob"]);

        assert!(db.remove_group_member("room", "bob").unwrap());
        assert!(!db.remove_group_member("room", "bob").unwrap());
        assert_eq!(db.group_members("room").unwrap(), vec!["alice"]);
        assert!(db.group_members("missing").unwrap().is_empty());
    }
}
