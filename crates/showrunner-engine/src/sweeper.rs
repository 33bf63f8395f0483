//! Retry sweeper — re-attempts failed deliveries once their backoff
//! window elapses, on its own cadence, independent of any showrunner.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use showrunner_core::StoreError;
use showrunner_store::{NotificationAttempt, RetryQueue};

use crate::backoff::RetryPolicy;
use crate::recorder::AnalyticsRecorder;
use crate::registry::TransportRegistry;

/// Counters for one sweep pass.
#[derive(Debug, Default)]
pub struct SweepStats {
    pub attempted: usize,
    pub delivered: usize,
    pub rescheduled: usize,
    pub dead_lettered: usize,
    pub pruned: usize,
}

/// Background re-delivery loop over the retry queue.
pub struct Sweeper {
    retries: RetryQueue,
    transports: Arc<TransportRegistry>,
    recorder: AnalyticsRecorder,
    policy: RetryPolicy,
    interval: Duration,
    /// None = keep dead letters forever.
    retention: Option<chrono::Duration>,
    cancel: CancellationToken,
}

impl Sweeper {
    pub fn new(
        retries: RetryQueue,
        transports: Arc<TransportRegistry>,
        recorder: AnalyticsRecorder,
        policy: RetryPolicy,
        interval: Duration,
        retention_days: u32,
        cancel: CancellationToken,
    ) -> Self {
        let retention =
            (retention_days > 0).then(|| chrono::Duration::days(retention_days as i64));
        Self { retries, transports, recorder, policy, interval, retention, cancel }
    }

    /// Spawn the sweeper loop as a background tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        tracing::info!("🧹 Retry sweeper started (sweep every {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep_once(Utc::now()).await {
                Ok(stats) if stats.attempted > 0 || stats.pruned > 0 => {
                    tracing::info!(
                        "🧹 Sweep: {} re-attempted ({} delivered, {} rescheduled, {} dead-lettered), {} pruned",
                        stats.attempted,
                        stats.delivered,
                        stats.rescheduled,
                        stats.dead_lettered,
                        stats.pruned
                    );
                }
                Ok(_) => tracing::debug!("🧹 Sweep: queue quiet"),
                Err(e) => tracing::warn!("⚠️ Sweep failed ({e}), retrying on next interval"),
            }
        }
        tracing::info!("🧹 Retry sweeper stopped");
    }

    /// One pass over everything currently due. Records are processed
    /// independently — a transport error on one never aborts the rest.
    /// Only store errors abort the pass.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepStats, StoreError> {
        let due = self.retries.due(now, self.policy.max_attempts)?;
        let mut stats = SweepStats::default();
        let mut touched: BTreeSet<String> = BTreeSet::new();

        for attempt in due {
            // Shutdown: finish nothing new; the current record already ran
            if self.cancel.is_cancelled() {
                break;
            }
            stats.attempted += 1;
            touched.insert(attempt.showrunner.clone());
            self.resweep(&attempt, now, &mut stats).await?;
        }

        // The sweep's outcomes land in its own accounting pass, sealed here
        for showrunner in touched {
            self.recorder.close_windows(&showrunner)?;
        }

        if let Some(retention) = self.retention {
            stats.pruned = self.retries.prune_dead(now - retention)?;
        }
        Ok(stats)
    }

    async fn resweep(
        &self,
        attempt: &NotificationAttempt,
        now: DateTime<Utc>,
        stats: &mut SweepStats,
    ) -> Result<(), StoreError> {
        let address = attempt.address.as_deref();

        let Some(transport) = self.transports.get(&attempt.channel) else {
            // The channel disappeared from configuration; nothing will
            // ever deliver this. Dead-letter rather than spin on it.
            tracing::warn!(
                "⚠️ No transport '{}' for queued attempt {} — dead-lettering",
                attempt.channel,
                attempt.id
            );
            self.retries.mark_dead(&attempt.id, now)?;
            self.recorder.record_outcome(&attempt.showrunner, &attempt.channel, address, false)?;
            stats.dead_lettered += 1;
            return Ok(());
        };

        match transport.send(&attempt.target(), &attempt.payload).await {
            Ok(()) => {
                self.retries.remove(&attempt.id)?;
                self.recorder.record_outcome(&attempt.showrunner, &attempt.channel, address, true)?;
                tracing::info!(
                    "✅ Retry delivered: '{}' → {} (after {} re-attempt(s))",
                    attempt.payload.title,
                    attempt.channel,
                    attempt.retry_count + 1
                );
                stats.delivered += 1;
            }
            Err(e) if e.retryable => {
                let next_count = attempt.retry_count + 1;
                if self.policy.exhausted(next_count) {
                    // Terminal: kept for audit, excluded from future sweeps
                    self.retries.mark_dead(&attempt.id, now)?;
                    self.recorder.record_outcome(
                        &attempt.showrunner,
                        &attempt.channel,
                        address,
                        false,
                    )?;
                    tracing::warn!(
                        "💀 Max retries exceeded, dead-lettered: '{}' → {} ({} attempts)",
                        attempt.payload.title,
                        attempt.channel,
                        next_count
                    );
                    stats.dead_lettered += 1;
                } else {
                    let next_eligible = self.policy.next_eligible(now, next_count);
                    let applied = self.retries.record_failure(
                        &attempt.id,
                        attempt.retry_count,
                        now,
                        next_eligible,
                    )?;
                    if applied {
                        tracing::debug!(
                            "🔁 Re-attempt {} failed for {} ({}), next try after {}",
                            next_count,
                            attempt.id,
                            e.reason,
                            next_eligible
                        );
                    } else {
                        // Another writer already moved this record on
                        tracing::debug!("🔁 Skipping stale retry update for {}", attempt.id);
                    }
                    stats.rescheduled += 1;
                }
            }
            Err(e) => {
                self.retries.mark_dead(&attempt.id, now)?;
                self.recorder.record_outcome(&attempt.showrunner, &attempt.channel, address, false)?;
                tracing::error!(
                    "🛑 Permanent failure on retry, dead-lettered: '{}' → {} ({})",
                    attempt.payload.title,
                    attempt.channel,
                    e.reason
                );
                stats.dead_lettered += 1;
            }
        }
        Ok(())
    }
}
