//! Durable retry queue with a terminal dead-letter state.
//!
//! The dispatch engine enqueues here on first delivery failure; the
//! sweeper re-attempts entries whose backoff window has elapsed. Retry
//! counts only move through compare-and-update, so a sweeper and any
//! other writer racing on the same record cannot lose an increment.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use showrunner_core::{ChannelTarget, Notification, StoreError};

use crate::db::{parse_ts, Store};

/// Lifecycle state of an attempt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Waiting for its backoff window; picked up by the sweeper.
    Pending,
    /// Terminal. Kept for audit, excluded from every sweep.
    Dead,
}

impl AttemptState {
    fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Pending => "pending",
            AttemptState::Dead => "dead",
        }
    }

    fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(AttemptState::Pending),
            "dead" => Ok(AttemptState::Dead),
            other => Err(StoreError::Data(format!("unknown attempt state '{other}'"))),
        }
    }
}

/// A delivery that has failed at least once.
#[derive(Debug, Clone)]
pub struct NotificationAttempt {
    pub id: String,
    pub showrunner: String,
    pub channel: String,
    pub address: Option<String>,
    pub payload: Notification,
    /// Number of re-attempts performed so far. Strictly increases.
    pub retry_count: u32,
    pub state: AttemptState,
    pub created_at: DateTime<Utc>,
    /// None until the sweeper has re-attempted it at least once.
    pub last_attempted: Option<DateTime<Utc>>,
    /// When the next re-attempt is allowed.
    pub eligible_at: DateTime<Utc>,
}

impl NotificationAttempt {
    pub fn target(&self) -> ChannelTarget {
        ChannelTarget { channel: self.channel.clone(), address: self.address.clone() }
    }
}

/// Queue of failed deliveries shared by the dispatcher and the sweeper.
#[derive(Clone)]
pub struct RetryQueue {
    db: Store,
}

impl RetryQueue {
    pub(crate) fn new(db: Store) -> Self {
        Self { db }
    }

    /// Record a retryable delivery failure. The caller supplies
    /// `eligible_at` — backoff policy lives with the engine, not here.
    pub fn enqueue(
        &self,
        showrunner: &str,
        target: &ChannelTarget,
        payload: &Notification,
        eligible_at: DateTime<Utc>,
    ) -> Result<NotificationAttempt, StoreError> {
        self.insert(showrunner, target, payload, AttemptState::Pending, eligible_at)
    }

    /// Record a permanently failed delivery straight into dead-letter —
    /// non-retryable transport errors never consume retry attempts.
    pub fn enqueue_dead(
        &self,
        showrunner: &str,
        target: &ChannelTarget,
        payload: &Notification,
    ) -> Result<NotificationAttempt, StoreError> {
        self.insert(showrunner, target, payload, AttemptState::Dead, Utc::now())
    }

    fn insert(
        &self,
        showrunner: &str,
        target: &ChannelTarget,
        payload: &Notification,
        state: AttemptState,
        eligible_at: DateTime<Utc>,
    ) -> Result<NotificationAttempt, StoreError> {
        let attempt = NotificationAttempt {
            id: Uuid::new_v4().to_string(),
            showrunner: showrunner.to_string(),
            channel: target.channel.clone(),
            address: target.address.clone(),
            payload: payload.clone(),
            retry_count: 0,
            state,
            created_at: Utc::now(),
            last_attempted: None,
            eligible_at,
        };
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| StoreError::Data(format!("encode payload: {e}")))?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_attempts
                 (id, showrunner, channel, address, payload, retry_count, state,
                  created_at, last_attempted, eligible_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, NULL, ?8)",
                params![
                    attempt.id,
                    attempt.showrunner,
                    attempt.channel,
                    attempt.address,
                    payload_json,
                    state.as_str(),
                    attempt.created_at.to_rfc3339(),
                    attempt.eligible_at.to_rfc3339(),
                ],
            )
        })?;
        Ok(attempt)
    }

    /// Pending records whose backoff window has elapsed and whose retry
    /// count is still under `max_attempts`, oldest-eligible first.
    pub fn due(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<NotificationAttempt>, StoreError> {
        let rows: Vec<AttemptRow> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, showrunner, channel, address, payload, retry_count, state,
                        created_at, last_attempted, eligible_at
                 FROM notification_attempts
                 WHERE state = 'pending' AND eligible_at <= ?1 AND retry_count < ?2
                 ORDER BY eligible_at",
            )?;
            let rows = stmt
                .query_map(params![now.to_rfc3339(), max_attempts], AttemptRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(AttemptRow::decode).collect()
    }

    /// Delete a record after a successful re-delivery.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM notification_attempts WHERE id = ?1", [id])
        })?;
        Ok(())
    }

    /// Compare-and-update after a failed re-attempt: bumps the retry
    /// count and reschedules, but only if the record still carries
    /// `expected_retry_count` and is still pending. Returns false when
    /// another writer got there first — the caller must not double-count.
    pub fn record_failure(
        &self,
        id: &str,
        expected_retry_count: u32,
        attempted_at: DateTime<Utc>,
        next_eligible: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE notification_attempts
                 SET retry_count = retry_count + 1, last_attempted = ?2, eligible_at = ?3
                 WHERE id = ?1 AND retry_count = ?4 AND state = 'pending'",
                params![
                    id,
                    attempted_at.to_rfc3339(),
                    next_eligible.to_rfc3339(),
                    expected_retry_count,
                ],
            )
        })?;
        Ok(changed == 1)
    }

    /// Transition a record to the terminal dead-letter state.
    pub fn mark_dead(&self, id: &str, attempted_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE notification_attempts
                 SET state = 'dead', last_attempted = ?2
                 WHERE id = ?1",
                params![id, attempted_at.to_rfc3339()],
            )
        })?;
        Ok(())
    }

    /// Number of records still awaiting re-delivery.
    pub fn pending_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM notification_attempts WHERE state = 'pending'",
                [],
                |row| row.get(0),
            )
        })?;
        Ok(n as u64)
    }

    /// Most recent dead-lettered records, for audit.
    pub fn dead_letters(&self, limit: usize) -> Result<Vec<NotificationAttempt>, StoreError> {
        let rows: Vec<AttemptRow> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, showrunner, channel, address, payload, retry_count, state,
                        created_at, last_attempted, eligible_at
                 FROM notification_attempts
                 WHERE state = 'dead'
                 ORDER BY COALESCE(last_attempted, created_at) DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit as i64], AttemptRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(AttemptRow::decode).collect()
    }

    /// Drop dead records last touched before `cutoff`. Retention policy,
    /// not correctness — pending records are never pruned.
    pub fn prune_dead(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let n = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM notification_attempts
                 WHERE state = 'dead' AND COALESCE(last_attempted, created_at) < ?1",
                [cutoff.to_rfc3339()],
            )
        })?;
        Ok(n)
    }

    /// Look up one record by id (test and audit helper).
    pub fn get(&self, id: &str) -> Result<Option<NotificationAttempt>, StoreError> {
        let row: Option<AttemptRow> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, showrunner, channel, address, payload, retry_count, state,
                        created_at, last_attempted, eligible_at
                 FROM notification_attempts WHERE id = ?1",
                [id],
                AttemptRow::from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })?;
        row.map(AttemptRow::decode).transpose()
    }
}

/// Raw row before JSON/timestamp decoding.
struct AttemptRow {
    id: String,
    showrunner: String,
    channel: String,
    address: Option<String>,
    payload: String,
    retry_count: u32,
    state: String,
    created_at: String,
    last_attempted: Option<String>,
    eligible_at: String,
}

impl AttemptRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            showrunner: row.get(1)?,
            channel: row.get(2)?,
            address: row.get(3)?,
            payload: row.get(4)?,
            retry_count: row.get(5)?,
            state: row.get(6)?,
            created_at: row.get(7)?,
            last_attempted: row.get(8)?,
            eligible_at: row.get(9)?,
        })
    }

    fn decode(self) -> Result<NotificationAttempt, StoreError> {
        Ok(NotificationAttempt {
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| StoreError::Data(format!("bad payload for '{}': {e}", self.id)))?,
            state: AttemptState::parse(&self.state)?,
            created_at: parse_ts(&self.created_at)?,
            last_attempted: self.last_attempted.as_deref().map(parse_ts).transpose()?,
            eligible_at: parse_ts(&self.eligible_at)?,
            id: self.id,
            showrunner: self.showrunner,
            channel: self.channel,
            address: self.address,
            retry_count: self.retry_count,
        })
    }
}
