//! Allow-list gate: which members' check-ins are counted in reports.
//!
//! Presence of a `(group_id, member_id)` row means allowed. Every change is
//! written straight to the database; nothing is cached.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension};

use crate::{LocBotStorage, Result};

impl LocBotStorage {
    /// Whether the member is currently on the group's allow-list.
    pub async fn is_allowed(&self, group_id: i64, member_id: i64) -> Result<bool> {
        self.with_conn(move |conn| query_is_allowed(conn, group_id, member_id))
            .await
    }

    /// Flip the member's allow-list presence. Returns the new state.
    pub async fn toggle_allowed(&self, group_id: i64, member_id: i64) -> Result<bool> {
        let allowed = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let allowed = if query_is_allowed(&tx, group_id, member_id)? {
                    tx.execute(
                        "DELETE FROM allowed WHERE group_id = ?1 AND member_id = ?2",
                        rusqlite::params![group_id, member_id],
                    )?;
                    false
                } else {
                    tx.execute(
                        "INSERT INTO allowed (group_id, member_id) VALUES (?1, ?2)",
                        rusqlite::params![group_id, member_id],
                    )?;
                    true
                };
                tx.commit()?;
                Ok(allowed)
            })
            .await?;
        tracing::info!(group_id, member_id, allowed, "Allow-list toggled");
        Ok(allowed)
    }

    /// Snapshot of the group's allow-list.
    pub async fn allow_list(&self, group_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(move |conn| query_allow_list(conn, group_id))
            .await
    }
}

fn query_is_allowed(conn: &Connection, group_id: i64, member_id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM allowed WHERE group_id = ?1 AND member_id = ?2",
            rusqlite::params![group_id, member_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn query_allow_list(conn: &Connection, group_id: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT member_id FROM allowed WHERE group_id = ?1")?;
    let ids = stmt
        .query_map(rusqlite::params![group_id], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_toggle_is_self_inverse() {
        let storage = LocBotStorage::open_in_memory().unwrap();
        assert!(!storage.is_allowed(1, 7).await.unwrap());

        assert!(storage.toggle_allowed(1, 7).await.unwrap());
        assert!(storage.is_allowed(1, 7).await.unwrap());

        assert!(!storage.toggle_allowed(1, 7).await.unwrap());
        assert!(!storage.is_allowed(1, 7).await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_scoped_per_group() {
        let storage = LocBotStorage::open_in_memory().unwrap();
        storage.toggle_allowed(1, 7).await.unwrap();
        assert!(!storage.is_allowed(2, 7).await.unwrap());
        assert!(!storage.is_allowed(1, 8).await.unwrap());
    }

    #[tokio::test]
    async fn test_allow_list_snapshot() {
        let storage = LocBotStorage::open_in_memory().unwrap();
        storage.toggle_allowed(1, 7).await.unwrap();
        storage.toggle_allowed(1, 8).await.unwrap();
        storage.toggle_allowed(1, 8).await.unwrap();
        storage.toggle_allowed(2, 9).await.unwrap();

        let snapshot = storage.allow_list(1).await.unwrap();
        assert_eq!(snapshot, HashSet::from([7]));

        // Later toggles don't affect an already-taken snapshot
        storage.toggle_allowed(1, 8).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(storage.allow_list(1).await.unwrap().len(), 2);
    }
}
