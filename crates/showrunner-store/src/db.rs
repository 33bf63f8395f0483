//! Shared SQLite handle and schema migrations.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use showrunner_core::StoreError;

use crate::analytics::AnalyticsStore;
use crate::checkpoint::CheckpointStore;
use crate::retry::RetryQueue;

/// Handle to the engine database. Cheap to clone; every clone shares one
/// connection behind a mutex, so a `commit` is atomic with respect to
/// concurrent readers.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("create data dir: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("DB open: {e}")))?;

        // WAL keeps readers unblocked while a loop commits
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("DB open: {e}")))?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
            -- One cursor per showrunner, overwritten atomically on commit
            CREATE TABLE IF NOT EXISTS checkpoints (
                showrunner TEXT PRIMARY KEY,
                cursor TEXT NOT NULL,               -- JSON, opaque to the store
                updated_at TEXT NOT NULL
            );

            -- Failed deliveries awaiting re-attempt, or dead-lettered for audit
            CREATE TABLE IF NOT EXISTS notification_attempts (
                id TEXT PRIMARY KEY,
                showrunner TEXT NOT NULL,
                channel TEXT NOT NULL,
                address TEXT,
                payload TEXT NOT NULL,              -- JSON notification
                retry_count INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL DEFAULT 'pending',  -- pending | dead
                created_at TEXT NOT NULL,
                last_attempted TEXT,
                eligible_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attempts_sweep
                ON notification_attempts (state, eligible_at);

            -- Sent/failed counters, one row per dispatch window (append-only)
            CREATE TABLE IF NOT EXISTS analytics_windows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL,
                address TEXT,
                showrunner TEXT NOT NULL,
                sent INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                window_start TEXT NOT NULL,
                window_end TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_analytics_open
                ON analytics_windows (showrunner, channel, window_end);
         ",
            )
        })
    }

    /// Checkpoint facade.
    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.clone())
    }

    /// Retry queue facade.
    pub fn retries(&self) -> RetryQueue {
        RetryQueue::new(self.clone())
    }

    /// Analytics facade.
    pub fn analytics(&self) -> AnalyticsStore {
        AnalyticsStore::new(self.clone())
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))?;
        f(&conn).map_err(sql_err)
    }
}

pub(crate) fn sql_err(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
            StoreError::Data(e.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// RFC3339 column → timestamp. Bad text is a data error, not an outage.
pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Data(format!("bad timestamp '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_migrate_in_memory() {
        let store = Store::open_in_memory().unwrap();
        // Tables exist and are empty
        assert!(store.checkpoints().all().unwrap().is_empty());
        assert_eq!(store.retries().pending_count().unwrap(), 0);
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = std::env::temp_dir().join("showrunner-store-test-open");
        std::fs::remove_dir_all(&dir).ok();
        let store = Store::open(&dir.join("nested").join("engine.db")).unwrap();
        assert!(store.checkpoints().all().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
