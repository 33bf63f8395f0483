//! # Showrunner Store
//!
//! SQLite-backed persistence — survives restarts, shared by every loop.
//!
//! Three facades over one database:
//! - [`CheckpointStore`] — one cursor per showrunner, committed only after
//!   a batch is fully handled.
//! - [`RetryQueue`] — failed deliveries with backoff bookkeeping and a
//!   terminal dead-letter state kept for audit.
//! - [`AnalyticsStore`] — append-only sent/failed windows per
//!   (channel, showrunner) pair.
//!
//! All three are cheap clones over the same connection; writers touching
//! the same retry record race through compare-and-update, never through
//! last-write-wins.

mod analytics;
mod checkpoint;
mod db;
mod retry;

pub use analytics::{AnalyticsStore, AnalyticsWindow};
pub use checkpoint::CheckpointStore;
pub use db::Store;
pub use retry::{AttemptState, NotificationAttempt, RetryQueue};
