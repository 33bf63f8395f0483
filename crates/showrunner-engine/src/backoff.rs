//! Exponential backoff policy for re-delivery.

use chrono::{DateTime, Utc};
use std::time::Duration;

use showrunner_core::config::RetryConfig;

/// Tunable retry parameters. Attempt *n* (0-indexed) becomes eligible
/// `base * 2^n` after its last attempt, capped at `cap`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self { base, cap, max_attempts }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay(), config.max_attempts)
    }

    /// Backoff delay before attempt `n` may run.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // 2^attempt saturates long before the cap stops mattering
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// When a record that just finished attempt `n - 1` becomes eligible
    /// for attempt `n`.
    pub fn next_eligible(&self, after: DateTime<Utc>, attempt: u32) -> DateTime<Utc> {
        let delay = chrono::Duration::from_std(self.delay_for(attempt))
            .unwrap_or_else(|_| chrono::Duration::seconds(self.cap.as_secs() as i64));
        after + delay
    }

    /// Whether a record with this many performed re-attempts is spent.
    pub fn exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(3600), 5)
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_secs(60));
        assert_eq!(p.delay_for(1), Duration::from_secs(120));
        assert_eq!(p.delay_for(2), Duration::from_secs(240));
        assert_eq!(p.delay_for(3), Duration::from_secs(480));
    }

    #[test]
    fn delay_is_capped() {
        let p = policy();
        assert_eq!(p.delay_for(6), Duration::from_secs(3600));
        // Far past any sane attempt count: still the cap, no overflow
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(3600));
    }

    #[test]
    fn exhaustion_threshold() {
        let p = policy();
        assert!(!p.exhausted(4));
        assert!(p.exhausted(5));
        assert!(p.exhausted(6));
    }

    #[test]
    fn next_eligible_advances_from_given_instant() {
        let p = policy();
        let now = Utc::now();
        assert_eq!(p.next_eligible(now, 0), now + chrono::Duration::seconds(60));
        assert_eq!(p.next_eligible(now, 2), now + chrono::Duration::seconds(240));
    }
}
