//! Error taxonomy for the engine.
//!
//! Every failure a showrunner can hit resolves to one of these shapes, and
//! each shape dictates what the caller does next: transient source/store
//! errors abort the tick and leave the checkpoint alone, corrupt cursors
//! park the loop for an operator, transport errors either enter the retry
//! queue or go straight to the dead-letter set.

use thiserror::Error;

/// Failures reported by an [`crate::traits::EventSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached. Transient — the tick aborts
    /// without committing and the loop retries on its normal interval.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The stored cursor is no longer valid for this source. Fatal to the
    /// showrunner's progress — requires operator intervention (replay or
    /// cursor reset), which is outside the engine's authority.
    #[error("source cursor corrupt: {0}")]
    Corrupt(String),
}

impl SourceError {
    /// Whether the next tick may simply try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Failure reported by a [`crate::traits::ChannelTransport`] delivery.
///
/// `retryable` decides the notification's fate: `true` enters the retry
/// queue with backoff, `false` (malformed address, rejected payload) goes
/// straight to dead-letter without consuming retry attempts.
#[derive(Debug, Error)]
#[error("transport error (retryable: {retryable}): {reason}")]
pub struct TransportError {
    pub retryable: bool,
    pub reason: String,
}

impl TransportError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self { retryable: true, reason: reason.into() }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self { retryable: false, reason: reason.into() }
    }
}

/// Failures from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database cannot be reached. Transient — a tick that
    /// hits this is treated as failed and retried later; the checkpoint
    /// is never advanced without a durable commit.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be decoded. Points at on-disk damage or
    /// a schema drift, not at a momentary outage.
    #[error("store data error: {0}")]
    Data(String),
}

/// Configuration load/parse failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_transience() {
        assert!(SourceError::Unavailable("rpc down".into()).is_transient());
        assert!(!SourceError::Corrupt("cursor past tip".into()).is_transient());
    }

    #[test]
    fn transport_error_display_tags_retryability() {
        let e = TransportError::retryable("timeout");
        assert!(e.to_string().contains("retryable: true"));
        let e = TransportError::permanent("bad address");
        assert!(e.to_string().contains("retryable: false"));
    }
}
