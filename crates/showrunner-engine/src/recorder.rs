//! Analytics recorder — the accounting face of the engine.

use showrunner_store::{AnalyticsStore, AnalyticsWindow};
use showrunner_core::StoreError;

/// Records per-channel, per-showrunner delivery outcomes into the open
/// analytics window and seals windows when a batch completes.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    store: AnalyticsStore,
}

impl AnalyticsRecorder {
    pub fn new(store: AnalyticsStore) -> Self {
        Self { store }
    }

    /// Count one outcome for (channel, showrunner).
    pub fn record_outcome(
        &self,
        showrunner: &str,
        channel: &str,
        address: Option<&str>,
        success: bool,
    ) -> Result<(), StoreError> {
        tracing::trace!(
            "📈 Outcome: {} via {} — {}",
            showrunner,
            channel,
            if success { "sent" } else { "failed" }
        );
        self.store.record_outcome(showrunner, channel, address, success)
    }

    /// Seal the showrunner's open windows at the end of a batch. The next
    /// outcome opens a fresh window; sealed rows are immutable history.
    pub fn close_windows(&self, showrunner: &str) -> Result<usize, StoreError> {
        self.store.close_windows(showrunner)
    }

    /// Closed-window history, newest first.
    pub fn history(
        &self,
        showrunner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnalyticsWindow>, StoreError> {
        self.store.closed_windows(showrunner, limit)
    }

    /// In-progress snapshot of whatever is still accumulating.
    pub fn snapshot(&self) -> Result<Vec<AnalyticsWindow>, StoreError> {
        self.store.open_windows()
    }
}
