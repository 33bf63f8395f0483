//! Durable checkpoint store — showrunner name → cursor.

use chrono::{DateTime, Utc};
use showrunner_core::{Cursor, StoreError};

use crate::db::{parse_ts, Store};

/// One cursor per showrunner, recording the last fully processed
/// position. Only the scheduler writes here, and only after a batch has
/// been delivered or durably queued — never before. Cursors are never
/// decremented by this component; replay is an operator action.
#[derive(Clone)]
pub struct CheckpointStore {
    db: Store,
}

impl CheckpointStore {
    pub(crate) fn new(db: Store) -> Self {
        Self { db }
    }

    /// Last committed cursor for `showrunner`, if any.
    pub fn cursor(&self, showrunner: &str) -> Result<Option<Cursor>, StoreError> {
        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT cursor FROM checkpoints WHERE showrunner = ?1",
                [showrunner],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })?;
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Data(format!("bad cursor for '{showrunner}': {e}"))),
            None => Ok(None),
        }
    }

    /// Atomically overwrite the cursor for `showrunner`. A single
    /// statement, so a concurrent reader sees either the old cursor or
    /// the new one — never a partial write.
    pub fn commit(&self, showrunner: &str, cursor: &Cursor) -> Result<(), StoreError> {
        let json = serde_json::to_string(cursor)
            .map_err(|e| StoreError::Data(format!("encode cursor: {e}")))?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO checkpoints (showrunner, cursor, updated_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![showrunner, json, Utc::now().to_rfc3339()],
            )
        })?;
        tracing::debug!("💾 Checkpoint committed: {} → {}", showrunner, cursor);
        Ok(())
    }

    /// All checkpoints, for startup logging and reporting.
    pub fn all(&self) -> Result<Vec<(String, Cursor, DateTime<Utc>)>, StoreError> {
        let rows: Vec<(String, String, String)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT showrunner, cursor, updated_at FROM checkpoints ORDER BY showrunner",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(name, json, ts)| {
                let cursor = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Data(format!("bad cursor for '{name}': {e}")))?;
                Ok((name, cursor, parse_ts(&ts)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_checkpoint_reads_as_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.checkpoints().cursor("gas-price").unwrap().is_none());
    }

    #[test]
    fn commit_then_read_back() {
        let store = Store::open_in_memory().unwrap();
        let checkpoints = store.checkpoints();
        checkpoints.commit("gas-price", &Cursor::from_block(103)).unwrap();
        let cursor = checkpoints.cursor("gas-price").unwrap().unwrap();
        assert_eq!(cursor.as_block(), Some(103));
    }

    #[test]
    fn commit_overwrites_prior_cursor() {
        let store = Store::open_in_memory().unwrap();
        let checkpoints = store.checkpoints();
        checkpoints.commit("gas-price", &Cursor::from_block(103)).unwrap();
        checkpoints.commit("gas-price", &Cursor::from_block(110)).unwrap();
        let cursor = checkpoints.cursor("gas-price").unwrap().unwrap();
        assert_eq!(cursor.as_block(), Some(110));
        // Still exactly one row per showrunner
        assert_eq!(checkpoints.all().unwrap().len(), 1);
    }

    #[test]
    fn showrunners_do_not_share_keys() {
        let store = Store::open_in_memory().unwrap();
        let checkpoints = store.checkpoints();
        checkpoints.commit("gas-price", &Cursor::from_block(7)).unwrap();
        checkpoints
            .commit("eth-ticker", &Cursor::from_json(serde_json::json!({"value": 2011.4})))
            .unwrap();
        assert_eq!(checkpoints.cursor("gas-price").unwrap().unwrap().as_block(), Some(7));
        assert!(checkpoints.cursor("eth-ticker").unwrap().unwrap().as_block().is_none());
    }
}
