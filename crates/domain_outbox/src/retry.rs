//! Retry policy for failed envelopes
//!
//! A `FAILED` envelope becomes eligible for another delivery once
//! `base_delay * 2^(attempts - 1)` (capped at `max_delay`) has passed since its
//! last attempt, unless it already failed `max_attempts` times.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exponential backoff settings for requeueing failed envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after the `attempts`-th failure
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// True once an envelope has used up all of its attempts
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// True if an envelope with `attempts` failures, last tried at
    /// `last_attempt`, may be requeued at `now`
    pub fn is_due(&self, attempts: u32, last_attempt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if self.is_exhausted(attempts) {
            return false;
        }
        let Some(last) = last_attempt else {
            return true;
        };
        match chrono::Duration::from_std(self.backoff(attempts))
            .ok()
            .and_then(|delay| last.checked_add_signed(delay))
        {
            Some(ready_at) => ready_at <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
        assert_eq!(policy.backoff(64), Duration::from_secs(10));
    }

    #[test]
    fn test_is_due_respects_backoff_and_exhaustion() {
        let policy = RetryPolicy::default();
        let failed_at = Utc::now();

        assert!(!policy.is_due(2, Some(failed_at), failed_at + chrono::Duration::milliseconds(1999)));
        assert!(policy.is_due(2, Some(failed_at), failed_at + chrono::Duration::seconds(2)));
        assert!(!policy.is_due(5, Some(failed_at), failed_at + chrono::Duration::days(1)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn backoff_never_exceeds_max(attempts in 0u32..200, base_ms in 1u64..10_000, max_ms in 1u64..1_000_000) {
            let policy = RetryPolicy::new(5, Duration::from_millis(base_ms), Duration::from_millis(max_ms));
            prop_assert!(policy.backoff(attempts) <= Duration::from_millis(max_ms));
        }

        #[test]
        fn backoff_is_monotonic(attempts in 1u32..100) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.backoff(attempts) <= policy.backoff(attempts + 1));
        }
    }
}
