//! # Showrunner Engine
//!
//! The moving parts: a registry of showrunners, one independent tick loop
//! per entry, the dispatch engine that fans events out to channels, the
//! retry sweeper, and the analytics recorder.
//!
//! ## Tick anatomy
//! ```text
//! read checkpoint (absent → genesis)
//!   → poll source
//!   → dispatch each event, in source order
//!       ok          → analytics sent += 1
//!       retryable   → retry queue (retry_count 0) + analytics failed += 1
//!       permanent   → dead-letter + analytics failed += 1
//!   → commit next cursor        (strictly last — never before dispatch)
//!   → close analytics window
//! ```
//! A source or store failure anywhere above aborts the tick without
//! committing, so the next tick re-reads the same events: at-least-once,
//! never silently skipped. One showrunner's bad tick never touches
//! another's loop.

pub mod backoff;
pub mod dispatch;
pub mod recorder;
pub mod registry;
pub mod runner;
pub mod sweeper;

pub use backoff::RetryPolicy;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use recorder::AnalyticsRecorder;
pub use registry::{RegistryError, Showrunner, ShowrunnerRegistry, TransportRegistry};
pub use runner::{Engine, TickError, TickOutcome};
pub use sweeper::{SweepStats, Sweeper};

#[cfg(test)]
pub(crate) mod testkit;
