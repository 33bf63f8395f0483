//! Dispatch engine — one event in, one delivery attempt per channel out.
//!
//! Channels are independent: a failure on one neither blocks nor rolls
//! back another's success. This component never retries — a retryable
//! failure becomes a queue record for the sweeper, a permanent one goes
//! straight to dead-letter. Only store errors propagate, because an
//! un-enqueued failure would otherwise vanish when the tick commits.

use chrono::Utc;
use std::sync::Arc;

use showrunner_core::{ChannelTarget, Notification, SourceEvent, StoreError};
use showrunner_store::RetryQueue;

use crate::backoff::RetryPolicy;
use crate::recorder::AnalyticsRecorder;
use crate::registry::TransportRegistry;

/// What happened to one (event, channel) pair.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub channel: String,
    pub delivered: bool,
    /// Queue record created for a failed delivery, if any.
    pub attempt_id: Option<String>,
    pub dead_lettered: bool,
}

/// Converts processed events into notifications and attempts delivery.
pub struct Dispatcher {
    transports: Arc<TransportRegistry>,
    retries: RetryQueue,
    recorder: AnalyticsRecorder,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        transports: Arc<TransportRegistry>,
        retries: RetryQueue,
        recorder: AnalyticsRecorder,
        policy: RetryPolicy,
    ) -> Self {
        Self { transports, retries, recorder, policy }
    }

    /// Deliver `event` to every target channel, in order. Returns one
    /// outcome per target.
    pub async fn dispatch(
        &self,
        showrunner: &str,
        event: &SourceEvent,
        targets: &[ChannelTarget],
    ) -> Result<Vec<DispatchOutcome>, StoreError> {
        let notification = Notification::from_event(showrunner, event);
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.dispatch_one(showrunner, target, &notification).await?);
        }
        Ok(outcomes)
    }

    async fn dispatch_one(
        &self,
        showrunner: &str,
        target: &ChannelTarget,
        notification: &Notification,
    ) -> Result<DispatchOutcome, StoreError> {
        let address = target.address.as_deref();

        let Some(transport) = self.transports.get(&target.channel) else {
            // No transport by that name: a configuration problem, not a
            // transient outage. Dead-letter without consuming attempts.
            tracing::warn!(
                "⚠️ No transport '{}' for showrunner '{}' — dead-lettering",
                target.channel,
                showrunner
            );
            let attempt = self.retries.enqueue_dead(showrunner, target, notification)?;
            self.recorder.record_outcome(showrunner, &target.channel, address, false)?;
            return Ok(DispatchOutcome {
                channel: target.channel.clone(),
                delivered: false,
                attempt_id: Some(attempt.id),
                dead_lettered: true,
            });
        };

        match transport.send(target, notification).await {
            Ok(()) => {
                tracing::info!(
                    "✅ Notification sent: '{}' → {} [{}]",
                    notification.title,
                    target.channel,
                    showrunner
                );
                self.recorder.record_outcome(showrunner, &target.channel, address, true)?;
                Ok(DispatchOutcome {
                    channel: target.channel.clone(),
                    delivered: true,
                    attempt_id: None,
                    dead_lettered: false,
                })
            }
            Err(e) if e.retryable => {
                let eligible_at = self.policy.next_eligible(Utc::now(), 0);
                let attempt =
                    self.retries.enqueue(showrunner, target, notification, eligible_at)?;
                tracing::warn!(
                    "⚠️ Delivery failed, queued for retry: '{}' → {} ({}) [attempt {}]",
                    notification.title,
                    target.channel,
                    e.reason,
                    attempt.id
                );
                self.recorder.record_outcome(showrunner, &target.channel, address, false)?;
                Ok(DispatchOutcome {
                    channel: target.channel.clone(),
                    delivered: false,
                    attempt_id: Some(attempt.id),
                    dead_lettered: false,
                })
            }
            Err(e) => {
                let attempt = self.retries.enqueue_dead(showrunner, target, notification)?;
                tracing::error!(
                    "🛑 Permanent delivery failure, dead-lettered: '{}' → {} ({})",
                    notification.title,
                    target.channel,
                    e.reason
                );
                self.recorder.record_outcome(showrunner, &target.channel, address, false)?;
                Ok(DispatchOutcome {
                    channel: target.channel.clone(),
                    delivered: false,
                    attempt_id: Some(attempt.id),
                    dead_lettered: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{event, policy_secs, MockTransport};
    use showrunner_store::{AttemptState, Store};
    use std::sync::Arc;

    fn dispatcher_with(
        transports: Vec<MockTransport>,
        store: &Store,
    ) -> (Dispatcher, AnalyticsRecorder) {
        let mut registry = TransportRegistry::new();
        for t in transports {
            registry.register(Arc::new(t));
        }
        let recorder = AnalyticsRecorder::new(store.analytics());
        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            store.retries(),
            recorder.clone(),
            policy_secs(60, 3600, 5),
        );
        (dispatcher, recorder)
    }

    #[tokio::test]
    async fn success_records_sent_and_queues_nothing() {
        let store = Store::open_in_memory().unwrap();
        let telegram = MockTransport::reliable("telegram");
        let sent_log = telegram.sent.clone();
        let (dispatcher, recorder) = dispatcher_with(vec![telegram], &store);

        let outcomes = dispatcher
            .dispatch("gas-price", &event("101"), &[ChannelTarget::new("telegram")])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].delivered);
        assert_eq!(sent_log.lock().unwrap().len(), 1);
        assert_eq!(store.retries().pending_count().unwrap(), 0);

        let open = recorder.snapshot().unwrap();
        assert_eq!(open[0].sent, 1);
        assert_eq!(open[0].failed, 0);
    }

    #[tokio::test]
    async fn retryable_failure_enqueues_with_count_zero() {
        let store = Store::open_in_memory().unwrap();
        let (dispatcher, recorder) =
            dispatcher_with(vec![MockTransport::failing("telegram", true)], &store);

        let outcomes = dispatcher
            .dispatch("gas-price", &event("101"), &[ChannelTarget::new("telegram")])
            .await
            .unwrap();

        let attempt_id = outcomes[0].attempt_id.clone().unwrap();
        let attempt = store.retries().get(&attempt_id).unwrap().unwrap();
        assert_eq!(attempt.retry_count, 0);
        assert_eq!(attempt.state, AttemptState::Pending);
        assert!(!outcomes[0].dead_lettered);

        let open = recorder.snapshot().unwrap();
        assert_eq!(open[0].failed, 1);
    }

    #[tokio::test]
    async fn permanent_failure_goes_straight_to_dead_letter() {
        let store = Store::open_in_memory().unwrap();
        let (dispatcher, _) =
            dispatcher_with(vec![MockTransport::failing("telegram", false)], &store);

        let outcomes = dispatcher
            .dispatch("gas-price", &event("101"), &[ChannelTarget::new("telegram")])
            .await
            .unwrap();

        assert!(outcomes[0].dead_lettered);
        assert_eq!(store.retries().pending_count().unwrap(), 0);
        assert_eq!(store.retries().dead_letters(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_channel_failure_does_not_block_another() {
        let store = Store::open_in_memory().unwrap();
        let discord = MockTransport::reliable("discord");
        let discord_sent = discord.sent.clone();
        let (dispatcher, recorder) =
            dispatcher_with(vec![MockTransport::failing("telegram", true), discord], &store);

        let targets = [ChannelTarget::new("telegram"), ChannelTarget::new("discord")];
        let outcomes = dispatcher.dispatch("gas-price", &event("101"), &targets).await.unwrap();

        assert!(!outcomes[0].delivered);
        assert!(outcomes[1].delivered);
        assert_eq!(discord_sent.lock().unwrap().len(), 1);
        assert_eq!(store.retries().pending_count().unwrap(), 1);

        // Separate windows per channel
        let open = recorder.snapshot().unwrap();
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn unknown_channel_dead_letters() {
        let store = Store::open_in_memory().unwrap();
        let (dispatcher, _) = dispatcher_with(vec![], &store);

        let outcomes = dispatcher
            .dispatch("gas-price", &event("101"), &[ChannelTarget::new("pager")])
            .await
            .unwrap();

        assert!(outcomes[0].dead_lettered);
        assert_eq!(store.retries().dead_letters(10).unwrap().len(), 1);
    }
}
