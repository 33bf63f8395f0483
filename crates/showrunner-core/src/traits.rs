//! Seams to the outside world: event sources and channel transports.
//!
//! The engine owns scheduling, checkpointing, retry, and accounting;
//! everything it watches and everything it talks to lives behind these
//! two traits and is injected at registration time.

use async_trait::async_trait;

use crate::error::{SourceError, TransportError};
use crate::types::{ChannelTarget, Cursor, Notification, SourceBatch};

/// A source of truth one showrunner watches: on-chain contract state, a
/// database change-feed, a price feed.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Cursor to start from when no checkpoint exists yet.
    fn genesis(&self) -> Cursor;

    /// Return the events newly available past `cursor`, in source order,
    /// and the cursor the caller should commit once they are handled.
    ///
    /// An empty batch with an unchanged cursor is a valid no-op answer.
    async fn poll(&self, cursor: &Cursor) -> Result<SourceBatch, SourceError>;
}

/// Outbound delivery to one kind of subscriber channel.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Transport name, used as the channel identifier in targets,
    /// retry records, and analytics rows.
    fn name(&self) -> &str;

    /// Deliver `notification` to `target`. Implementations decide what
    /// the target address means and signal retryability on failure.
    /// Idempotency across re-attempts is the transport's discretion —
    /// the engine guarantees at-least-once, not exactly-once.
    async fn send(
        &self,
        target: &ChannelTarget,
        notification: &Notification,
    ) -> Result<(), TransportError>;
}
