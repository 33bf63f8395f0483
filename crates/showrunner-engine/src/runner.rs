//! Scheduler loops — one independent, indefinitely repeating tick loop
//! per registered showrunner.
//!
//! Single-flight per showrunner is structural: each name gets exactly one
//! loop, and a tick runs to completion before the next interval is
//! awaited, so cursor advancement is strictly ordered. Loops never share
//! state beyond the store, and no two loops touch the same checkpoint
//! key.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use showrunner_core::{ChannelTarget, Cursor, EventSource, SourceError, StoreError};
use showrunner_store::CheckpointStore;

use crate::dispatch::Dispatcher;
use crate::recorder::AnalyticsRecorder;
use crate::registry::ShowrunnerRegistry;

/// Why a tick did not complete.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a completed tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Empty batch, unchanged cursor — nothing to do.
    Idle,
    /// Batch fully handled and the checkpoint committed.
    Completed { events: usize, cursor: Cursor },
    /// Shutdown arrived mid-batch. The in-flight event was finished, the
    /// rest were not started, and the checkpoint was NOT advanced — the
    /// whole batch is re-read on next startup.
    Interrupted,
}

/// Spawns and owns the per-showrunner loops.
pub struct Engine {
    registry: ShowrunnerRegistry,
    checkpoints: CheckpointStore,
    dispatcher: Arc<Dispatcher>,
    recorder: AnalyticsRecorder,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        registry: ShowrunnerRegistry,
        checkpoints: CheckpointStore,
        dispatcher: Arc<Dispatcher>,
        recorder: AnalyticsRecorder,
        cancel: CancellationToken,
    ) -> Self {
        Self { registry, checkpoints, dispatcher, recorder, cancel }
    }

    /// Spawn one tokio task per registered showrunner. A slow or stuck
    /// showrunner only ever occupies its own task.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        self.registry
            .into_entries()
            .into_iter()
            .map(|entry| {
                let ctx = LoopCtx {
                    name: entry.name,
                    interval: entry.interval,
                    source: entry.source,
                    targets: entry.targets,
                    checkpoints: self.checkpoints.clone(),
                    dispatcher: self.dispatcher.clone(),
                    recorder: self.recorder.clone(),
                    cancel: self.cancel.clone(),
                };
                tokio::spawn(run_loop(ctx))
            })
            .collect()
    }
}

/// Everything one loop needs, owned by its task.
pub(crate) struct LoopCtx {
    pub(crate) name: String,
    pub(crate) interval: Duration,
    pub(crate) source: Arc<dyn EventSource>,
    pub(crate) targets: Vec<ChannelTarget>,
    pub(crate) checkpoints: CheckpointStore,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) recorder: AnalyticsRecorder,
    pub(crate) cancel: CancellationToken,
}

pub(crate) async fn run_loop(ctx: LoopCtx) {
    tracing::info!("🎬 Showrunner '{}' started (poll every {:?})", ctx.name, ctx.interval);
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match run_tick(&ctx).await {
            Ok(TickOutcome::Idle) => {
                tracing::debug!("💤 '{}' tick: nothing new", ctx.name);
            }
            Ok(TickOutcome::Completed { events, cursor }) => {
                tracing::info!("🔔 '{}' tick: {} event(s), cursor → {}", ctx.name, events, cursor);
            }
            Ok(TickOutcome::Interrupted) => break,
            Err(TickError::Source(SourceError::Corrupt(reason))) => {
                // Distinguishable from a transient outage: the loop parks
                // and stays parked until an operator resets the cursor.
                tracing::error!(
                    "🛑 Showrunner '{}' parked: cursor corrupt ({reason}) — operator action required",
                    ctx.name
                );
                break;
            }
            Err(e) => {
                tracing::warn!("⚠️ '{}' tick failed ({e}), retrying on next interval", ctx.name);
            }
        }
    }
    tracing::info!("🎬 Showrunner '{}' stopped", ctx.name);
}

/// One tick. The checkpoint commit is strictly the last step: it only
/// happens after every event in the batch has been delivered or durably
/// queued for retry.
pub(crate) async fn run_tick(ctx: &LoopCtx) -> Result<TickOutcome, TickError> {
    let cursor = match ctx.checkpoints.cursor(&ctx.name)? {
        Some(cursor) => cursor,
        None => ctx.source.genesis(),
    };

    let batch = ctx.source.poll(&cursor).await?;
    if batch.events.is_empty() && batch.next_cursor == cursor {
        return Ok(TickOutcome::Idle);
    }

    let mut dispatched = 0;
    for event in &batch.events {
        // Polled only between events, so an in-flight event always
        // finishes before shutdown wins.
        if ctx.cancel.is_cancelled() {
            tracing::info!(
                "🎬 '{}' interrupted mid-batch ({}/{} events dispatched, not committing)",
                ctx.name,
                dispatched,
                batch.events.len()
            );
            return Ok(TickOutcome::Interrupted);
        }
        ctx.dispatcher.dispatch(&ctx.name, event, &ctx.targets).await?;
        dispatched += 1;
    }

    ctx.checkpoints.commit(&ctx.name, &batch.next_cursor)?;
    ctx.recorder.close_windows(&ctx.name)?;
    Ok(TickOutcome::Completed { events: dispatched, cursor: batch.next_cursor })
}
