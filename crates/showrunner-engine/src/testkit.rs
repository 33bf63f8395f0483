//! Test doubles shared across the engine's test modules.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use showrunner_core::{
    ChannelTarget, ChannelTransport, Cursor, EventSource, Notification, NotifyPriority,
    SourceBatch, SourceError, SourceEvent, TransportError,
};

use crate::backoff::RetryPolicy;

pub(crate) fn event(id: &str) -> SourceEvent {
    SourceEvent {
        id: id.to_string(),
        title: format!("Event {id}"),
        body: format!("Something happened at {id}"),
        priority: NotifyPriority::Normal,
        observed_at: Utc::now(),
    }
}

pub(crate) fn policy_secs(base: u64, cap: u64, max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(Duration::from_secs(base), Duration::from_secs(cap), max_attempts)
}

/// One scripted answer to a poll.
pub(crate) enum ScriptedPoll {
    Batch(Vec<SourceEvent>, Cursor),
    Unavailable,
    Corrupt,
}

/// Source that plays back a script, one entry per poll, and records the
/// cursor it was handed each time. An exhausted script answers with
/// no-op batches.
pub(crate) struct MockSource {
    genesis: Cursor,
    script: Mutex<VecDeque<ScriptedPoll>>,
    pub polled: Arc<Mutex<Vec<Cursor>>>,
}

impl MockSource {
    pub fn new(genesis: Cursor, script: Vec<ScriptedPoll>) -> Self {
        Self {
            genesis,
            script: Mutex::new(script.into()),
            polled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script entry producing one event per block in `blocks`, advancing
    /// the cursor to the last block.
    pub fn blocks(blocks: std::ops::RangeInclusive<u64>) -> ScriptedPoll {
        let events = blocks.clone().map(|b| event(&b.to_string())).collect();
        ScriptedPoll::Batch(events, Cursor::from_block(*blocks.end()))
    }
}

#[async_trait]
impl EventSource for MockSource {
    fn genesis(&self) -> Cursor {
        self.genesis.clone()
    }

    async fn poll(&self, cursor: &Cursor) -> Result<SourceBatch, SourceError> {
        self.polled.lock().unwrap().push(cursor.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedPoll::Batch(events, next_cursor)) => {
                Ok(SourceBatch { events, next_cursor })
            }
            Some(ScriptedPoll::Unavailable) => {
                Err(SourceError::Unavailable("scripted outage".into()))
            }
            Some(ScriptedPoll::Corrupt) => Err(SourceError::Corrupt("scripted corruption".into())),
            None => Ok(SourceBatch::empty(cursor.clone())),
        }
    }
}

enum TransportMode {
    Reliable,
    Failing { retryable: bool },
    FailFirst { remaining: usize, retryable: bool },
}

/// Transport with a switchable failure mode and a log of deliveries.
pub(crate) struct MockTransport {
    name: String,
    mode: Mutex<TransportMode>,
    pub sent: Arc<Mutex<Vec<(ChannelTarget, Notification)>>>,
}

impl MockTransport {
    pub fn reliable(name: &str) -> Self {
        Self::with_mode(name, TransportMode::Reliable)
    }

    pub fn failing(name: &str, retryable: bool) -> Self {
        Self::with_mode(name, TransportMode::Failing { retryable })
    }

    /// Fail the first `n` sends, then deliver reliably.
    pub fn fail_first(name: &str, n: usize, retryable: bool) -> Self {
        Self::with_mode(name, TransportMode::FailFirst { remaining: n, retryable })
    }

    fn with_mode(name: &str, mode: TransportMode) -> Self {
        Self {
            name: name.to_string(),
            mode: Mutex::new(mode),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        target: &ChannelTarget,
        notification: &Notification,
    ) -> Result<(), TransportError> {
        let mut mode = self.mode.lock().unwrap();
        match &mut *mode {
            TransportMode::Reliable => {}
            TransportMode::Failing { retryable } => {
                return Err(TransportError { retryable: *retryable, reason: "scripted".into() });
            }
            TransportMode::FailFirst { remaining, retryable } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransportError {
                        retryable: *retryable,
                        reason: "scripted".into(),
                    });
                }
            }
        }
        self.sent.lock().unwrap().push((target.clone(), notification.clone()));
        Ok(())
    }
}
