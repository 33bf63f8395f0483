//! # Showrunner Core
//!
//! Shared foundation for the showrunner notification engine: the domain
//! types, the source/transport traits, the error taxonomy, and the
//! configuration system.
//!
//! ## Architecture
//! ```text
//! Showrunner loop (one tokio task per registered showrunner)
//!   ├── CheckpointStore.cursor(name)      — where did we leave off?
//!   ├── EventSource.poll(cursor)          — what happened since?
//!   ├── Dispatcher.dispatch(event, ...)   — deliver to channels
//!   │     ├── ok     → AnalyticsRecorder (sent += 1)
//!   │     └── failed → RetryQueue (backed-off re-attempts)
//!   └── CheckpointStore.commit(cursor)    — strictly last step
//!
//! Retry sweeper (one independent tokio task)
//!   └── due attempts → ChannelTransport.send → delete | backoff | dead-letter
//! ```
//!
//! Everything a component collaborates with is handed to it explicitly —
//! no ambient globals, no process-wide lookups.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ShowrunnersConfig;
pub use error::{ConfigError, SourceError, StoreError, TransportError};
pub use traits::{ChannelTransport, EventSource};
pub use types::{
    ChannelTarget, Cursor, Notification, NotifyPriority, SourceBatch, SourceEvent,
};
