//! Domain types — cursors, source events, notifications, channel targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque polling position for one showrunner.
///
/// The engine never interprets a cursor — it reads one from the checkpoint
/// store, hands it to the source, and commits whatever the source returns.
/// Sources choose their own shape: a block number, a row offset, a
/// composite `{value, ts}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub serde_json::Value);

impl Cursor {
    /// A block-height cursor.
    pub fn from_block(height: u64) -> Self {
        Self(serde_json::json!(height))
    }

    /// Read this cursor back as a block height, if that is its shape.
    pub fn as_block(&self) -> Option<u64> {
        self.0.as_u64()
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One newly observed event from a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Source-assigned identifier (block number, row id, ...). Used for
    /// logging and audit, not for dedup — delivery is at-least-once.
    pub id: String,
    /// Notification title derived from the event.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Priority for downstream rendering.
    #[serde(default)]
    pub priority: NotifyPriority,
    /// When the source observed the event.
    pub observed_at: DateTime<Utc>,
}

/// What a poll returns: the events since the cursor, in source order, plus
/// the position the checkpoint should advance to once they are handled.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub events: Vec<SourceEvent>,
    pub next_cursor: Cursor,
}

impl SourceBatch {
    /// A no-op batch: nothing new, cursor unchanged.
    pub fn empty(cursor: Cursor) -> Self {
        Self { events: Vec::new(), next_cursor: cursor }
    }
}

/// A notification ready for a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: NotifyPriority,
    /// Which showrunner produced this.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Build the payload for `event` on behalf of `showrunner`.
    pub fn from_event(showrunner: &str, event: &SourceEvent) -> Self {
        Self {
            title: event.title.clone(),
            body: event.body.clone(),
            priority: event.priority.clone(),
            source: showrunner.to_string(),
            timestamp: event.observed_at,
        }
    }
}

/// Notification priority.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Where a notification should go: a transport by name, plus the
/// per-subscriber address that transport understands (chat id, webhook
/// URL). `address: None` means the transport's configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTarget {
    pub channel: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl ChannelTarget {
    pub fn new(channel: impl Into<String>) -> Self {
        Self { channel: channel.into(), address: None }
    }

    pub fn with_address(channel: impl Into<String>, address: impl Into<String>) -> Self {
        Self { channel: channel.into(), address: Some(address.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_cursor_round_trip() {
        let c = Cursor::from_block(103);
        assert_eq!(c.as_block(), Some(103));
        assert_eq!(c.to_string(), "103");
    }

    #[test]
    fn composite_cursor_is_opaque() {
        let c = Cursor::from_json(serde_json::json!({"value": 41.5, "ts": "2026-01-01T00:00:00Z"}));
        assert_eq!(c.as_block(), None);
        let json = serde_json::to_string(&c).unwrap();
        let back: Cursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn notification_carries_showrunner_name() {
        let event = SourceEvent {
            id: "101".into(),
            title: "Gas spike".into(),
            body: "Base fee crossed 80 gwei".into(),
            priority: NotifyPriority::High,
            observed_at: Utc::now(),
        };
        let n = Notification::from_event("gas-price", &event);
        assert_eq!(n.source, "gas-price");
        assert_eq!(n.priority, NotifyPriority::High);
    }
}
