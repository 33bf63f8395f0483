//! Built-in event source adapters for the daemon.
//!
//! Real deployments watch contracts and change-feeds; these two adapters
//! cover the daemon's out-of-the-box needs: a price feed that emits an
//! event when the observed value moves past a configured threshold, and
//! a heartbeat that fires every poll (handy for verifying channel
//! wiring).

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

use showrunner_core::config::ShowrunnerEntry;
use showrunner_core::{
    Cursor, EventSource, NotifyPriority, SourceBatch, SourceError, SourceEvent,
};

/// Construct the source adapter a config entry asks for.
pub fn build(entry: &ShowrunnerEntry) -> anyhow::Result<Arc<dyn EventSource>> {
    match entry.kind.as_str() {
        "price-feed" => Ok(Arc::new(PriceFeedSource::from_entry(entry))),
        "heartbeat" => Ok(Arc::new(HeartbeatSource::new(&entry.name))),
        other => bail!("unknown source kind '{}' for showrunner '{}'", other, entry.name),
    }
}

/// Watches a JSON HTTP endpoint and emits an event when the value moves
/// at least `delta_pct` percent from the last baseline. The cursor is
/// the baseline: `{"value": ..., "observed_at": ...}`. Without an
/// endpoint it falls back to a simulated random walk, which keeps a
/// fresh install observable before any real feed is wired up.
pub struct PriceFeedSource {
    label: String,
    endpoint: Option<String>,
    field: String,
    delta_pct: f64,
    client: reqwest::Client,
}

impl PriceFeedSource {
    pub fn from_entry(entry: &ShowrunnerEntry) -> Self {
        Self {
            label: entry.name.clone(),
            endpoint: entry.endpoint.clone(),
            field: entry.field.clone(),
            delta_pct: entry.delta_pct,
            client: reqwest::Client::new(),
        }
    }

    /// Current feed value, fetched or simulated.
    async fn observe(&self, last: Option<f64>) -> Result<f64, SourceError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(simulate_walk(last));
        };

        let resp = self
            .client
            .get(endpoint)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", self.label)))?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{}: endpoint returned {}",
                self.label,
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: bad response body: {e}", self.label)))?;
        body.get(&self.field).and_then(|v| v.as_f64()).ok_or_else(|| {
            SourceError::Unavailable(format!(
                "{}: field '{}' missing or not numeric",
                self.label, self.field
            ))
        })
    }
}

#[async_trait]
impl EventSource for PriceFeedSource {
    fn genesis(&self) -> Cursor {
        // No baseline yet: the first poll records one without emitting
        Cursor::from_json(serde_json::Value::Null)
    }

    async fn poll(&self, cursor: &Cursor) -> Result<SourceBatch, SourceError> {
        let last = baseline(cursor)?;
        let current = self.observe(last).await?;

        let Some(last) = last else {
            // First poll establishes the baseline
            return Ok(SourceBatch { events: Vec::new(), next_cursor: baseline_cursor(current) });
        };

        let moved_pct = move_pct(last, current);
        if moved_pct < self.delta_pct {
            // Baseline stands; unchanged cursor makes this a no-op tick
            return Ok(SourceBatch::empty(cursor.clone()));
        }

        let direction = if current > last { "up" } else { "down" };
        let event = SourceEvent {
            id: format!("{current:.4}@{}", Utc::now().timestamp()),
            title: format!("{} moved {moved_pct:.2}% {direction}", self.label),
            body: format!("Observed {current:.4}, previous baseline {last:.4}"),
            priority: if moved_pct >= self.delta_pct * 2.0 {
                NotifyPriority::High
            } else {
                NotifyPriority::Normal
            },
            observed_at: Utc::now(),
        };
        Ok(SourceBatch { events: vec![event], next_cursor: baseline_cursor(current) })
    }
}

/// Decode the baseline out of a price-feed cursor. A cursor that is
/// neither the genesis null nor `{"value": <number>, ...}` is corrupt —
/// someone else's cursor shape, or on-disk damage.
fn baseline(cursor: &Cursor) -> Result<Option<f64>, SourceError> {
    if cursor.0.is_null() {
        return Ok(None);
    }
    cursor
        .0
        .get("value")
        .and_then(|v| v.as_f64())
        .map(Some)
        .ok_or_else(|| SourceError::Corrupt(format!("cursor has no numeric value: {}", cursor.0)))
}

fn baseline_cursor(value: f64) -> Cursor {
    Cursor::from_json(serde_json::json!({
        "value": value,
        "observed_at": Utc::now().to_rfc3339(),
    }))
}

fn move_pct(last: f64, current: f64) -> f64 {
    if last == 0.0 {
        return 0.0;
    }
    ((current - last) / last).abs() * 100.0
}

fn simulate_walk(last: Option<f64>) -> f64 {
    let base = last.unwrap_or(100.0);
    let drift = rand::thread_rng().gen_range(-0.03..0.03);
    base * (1.0 + drift)
}

/// Emits one event per poll. The cursor is a plain tick counter.
pub struct HeartbeatSource {
    label: String,
}

impl HeartbeatSource {
    pub fn new(label: &str) -> Self {
        Self { label: label.to_string() }
    }
}

#[async_trait]
impl EventSource for HeartbeatSource {
    fn genesis(&self) -> Cursor {
        Cursor::from_block(0)
    }

    async fn poll(&self, cursor: &Cursor) -> Result<SourceBatch, SourceError> {
        let count = cursor
            .as_block()
            .ok_or_else(|| SourceError::Corrupt(format!("cursor is not a counter: {}", cursor.0)))?;
        let event = SourceEvent {
            id: (count + 1).to_string(),
            title: format!("{} heartbeat #{}", self.label, count + 1),
            body: format!("Still alive at {}", Utc::now().to_rfc3339()),
            priority: NotifyPriority::Low,
            observed_at: Utc::now(),
        };
        Ok(SourceBatch { events: vec![event], next_cursor: Cursor::from_block(count + 1) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heartbeat_counts_up_from_genesis() {
        let source = HeartbeatSource::new("pulse");
        let batch = source.poll(&source.genesis()).await.unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].id, "1");
        assert_eq!(batch.next_cursor.as_block(), Some(1));

        let batch = source.poll(&batch.next_cursor).await.unwrap();
        assert_eq!(batch.events[0].id, "2");
    }

    #[tokio::test]
    async fn heartbeat_rejects_foreign_cursor() {
        let source = HeartbeatSource::new("pulse");
        let err = source
            .poll(&Cursor::from_json(serde_json::json!({"value": 1.0})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Corrupt(_)));
    }

    #[test]
    fn move_threshold_math() {
        assert!((move_pct(100.0, 103.0) - 3.0).abs() < 1e-9);
        assert!((move_pct(100.0, 97.0) - 3.0).abs() < 1e-9);
        assert_eq!(move_pct(0.0, 50.0), 0.0);
    }

    #[test]
    fn baseline_decoding() {
        assert_eq!(baseline(&Cursor::from_json(serde_json::Value::Null)).unwrap(), None);
        let c = baseline_cursor(41.5);
        assert_eq!(baseline(&c).unwrap(), Some(41.5));
        assert!(baseline(&Cursor::from_block(7)).is_err());
    }

    #[tokio::test]
    async fn simulated_feed_sets_baseline_then_watches_it() {
        let entry = ShowrunnerEntry {
            name: "sim".into(),
            kind: "price-feed".into(),
            poll_interval_secs: 60,
            endpoint: None,
            field: "price".into(),
            delta_pct: 0.0,
            channels: vec![],
        };
        let source = PriceFeedSource::from_entry(&entry);

        // First poll: baseline only, no event
        let batch = source.poll(&source.genesis()).await.unwrap();
        assert!(batch.events.is_empty());
        assert!(baseline(&batch.next_cursor).unwrap().is_some());

        // delta_pct 0 means any drift is an event
        let batch = source.poll(&batch.next_cursor).await.unwrap();
        assert_eq!(batch.events.len(), 1);
    }

    #[test]
    fn unknown_kind_is_refused() {
        let entry = ShowrunnerEntry {
            name: "x".into(),
            kind: "carrier-pigeon".into(),
            poll_interval_secs: 60,
            endpoint: None,
            field: "price".into(),
            delta_pct: 1.0,
            channels: vec![],
        };
        assert!(build(&entry).is_err());
    }
}
