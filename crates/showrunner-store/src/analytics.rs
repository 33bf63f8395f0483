//! Analytics windows — append-only sent/failed accounting.
//!
//! One row per (channel, showrunner) pair per dispatch window. A window
//! opens lazily at the first outcome of a batch, accumulates counters as
//! outcomes resolve, and is sealed when the batch completes. Sealed rows
//! are history: they are never incremented or reopened.

use chrono::{DateTime, Utc};
use rusqlite::params;

use showrunner_core::StoreError;

use crate::db::{parse_ts, Store};

/// One accounting window.
#[derive(Debug, Clone)]
pub struct AnalyticsWindow {
    pub id: i64,
    pub channel: String,
    pub address: Option<String>,
    pub showrunner: String,
    pub sent: u64,
    pub failed: u64,
    pub window_start: DateTime<Utc>,
    /// None while the window is still open.
    pub window_end: Option<DateTime<Utc>>,
}

/// Store facade for analytics windows.
#[derive(Clone)]
pub struct AnalyticsStore {
    db: Store,
}

impl AnalyticsStore {
    pub(crate) fn new(db: Store) -> Self {
        Self { db }
    }

    /// Count one delivery outcome against the open window for
    /// (channel, showrunner), opening a fresh window if none is open.
    /// Closed windows are never touched.
    pub fn record_outcome(
        &self,
        showrunner: &str,
        channel: &str,
        address: Option<&str>,
        success: bool,
    ) -> Result<(), StoreError> {
        let (sent, failed) = if success { (1, 0) } else { (0, 1) };
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE analytics_windows
                 SET sent = sent + ?3, failed = failed + ?4
                 WHERE showrunner = ?1 AND channel = ?2 AND window_end IS NULL",
                params![showrunner, channel, sent, failed],
            )?;
            if changed == 0 {
                conn.execute(
                    "INSERT INTO analytics_windows
                     (channel, address, showrunner, sent, failed, window_start)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![channel, address, showrunner, sent, failed, Utc::now().to_rfc3339()],
                )?;
            }
            Ok(())
        })
    }

    /// Seal every open window belonging to `showrunner`. Called at the
    /// end of a tick (and at the end of a sweep pass, for the sweep's own
    /// accounting). Returns how many windows were closed.
    pub fn close_windows(&self, showrunner: &str) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE analytics_windows SET window_end = ?2
                 WHERE showrunner = ?1 AND window_end IS NULL",
                params![showrunner, Utc::now().to_rfc3339()],
            )
        })
    }

    /// Closed-window history, newest first. `showrunner = None` reads
    /// across all showrunners.
    pub fn closed_windows(
        &self,
        showrunner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnalyticsWindow>, StoreError> {
        self.query_windows("window_end IS NOT NULL", showrunner, limit)
    }

    /// Best-effort snapshot of windows still accumulating.
    pub fn open_windows(&self) -> Result<Vec<AnalyticsWindow>, StoreError> {
        self.query_windows("window_end IS NULL", None, usize::MAX)
    }

    fn query_windows(
        &self,
        state_clause: &str,
        showrunner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnalyticsWindow>, StoreError> {
        let sql = format!(
            "SELECT id, channel, address, showrunner, sent, failed, window_start, window_end
             FROM analytics_windows
             WHERE {state_clause} AND (?1 IS NULL OR showrunner = ?1)
             ORDER BY window_start DESC, id DESC
             LIMIT ?2"
        );
        let rows: Vec<WindowRow> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![showrunner, limit.min(i64::MAX as usize) as i64], |row| {
                    Ok(WindowRow {
                        id: row.get(0)?,
                        channel: row.get(1)?,
                        address: row.get(2)?,
                        showrunner: row.get(3)?,
                        sent: row.get(4)?,
                        failed: row.get(5)?,
                        window_start: row.get(6)?,
                        window_end: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(WindowRow::decode).collect()
    }
}

struct WindowRow {
    id: i64,
    channel: String,
    address: Option<String>,
    showrunner: String,
    sent: i64,
    failed: i64,
    window_start: String,
    window_end: Option<String>,
}

impl WindowRow {
    fn decode(self) -> Result<AnalyticsWindow, StoreError> {
        Ok(AnalyticsWindow {
            id: self.id,
            channel: self.channel,
            address: self.address,
            showrunner: self.showrunner,
            sent: self.sent as u64,
            failed: self.failed as u64,
            window_start: parse_ts(&self.window_start)?,
            window_end: self.window_end.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_accumulate_in_one_open_window() {
        let analytics = Store::open_in_memory().unwrap().analytics();
        analytics.record_outcome("gas-price", "telegram", Some("-100123"), true).unwrap();
        analytics.record_outcome("gas-price", "telegram", Some("-100123"), true).unwrap();
        analytics.record_outcome("gas-price", "telegram", Some("-100123"), false).unwrap();

        let open = analytics.open_windows().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].sent, 2);
        assert_eq!(open[0].failed, 1);
        assert!(open[0].window_end.is_none());
    }

    #[test]
    fn channels_get_separate_windows() {
        let analytics = Store::open_in_memory().unwrap().analytics();
        analytics.record_outcome("gas-price", "telegram", None, true).unwrap();
        analytics.record_outcome("gas-price", "discord", None, true).unwrap();
        assert_eq!(analytics.open_windows().unwrap().len(), 2);
    }

    #[test]
    fn close_seals_and_new_outcomes_open_a_fresh_window() {
        let analytics = Store::open_in_memory().unwrap().analytics();
        analytics.record_outcome("gas-price", "telegram", None, true).unwrap();
        assert_eq!(analytics.close_windows("gas-price").unwrap(), 1);

        // The sealed window is history; a later outcome opens a new row
        analytics.record_outcome("gas-price", "telegram", None, false).unwrap();

        let closed = analytics.closed_windows(Some("gas-price"), 10).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].sent, 1);
        assert_eq!(closed[0].failed, 0);
        assert!(closed[0].window_end.is_some());

        let open = analytics.open_windows().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].failed, 1);
    }

    #[test]
    fn closing_with_nothing_open_is_a_noop() {
        let analytics = Store::open_in_memory().unwrap().analytics();
        assert_eq!(analytics.close_windows("gas-price").unwrap(), 0);
    }

    #[test]
    fn history_filter_by_showrunner() {
        let analytics = Store::open_in_memory().unwrap().analytics();
        analytics.record_outcome("gas-price", "telegram", None, true).unwrap();
        analytics.record_outcome("eth-ticker", "telegram", None, true).unwrap();
        analytics.close_windows("gas-price").unwrap();
        analytics.close_windows("eth-ticker").unwrap();

        assert_eq!(analytics.closed_windows(Some("gas-price"), 10).unwrap().len(), 1);
        assert_eq!(analytics.closed_windows(None, 10).unwrap().len(), 2);
    }
}
