//! Exponential backoff with a cap and dead-lettering.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How failed uploads are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub base_delay_secs: u64,
    /// Upper bound for any single delay
    pub max_delay_secs: u64,
    /// Failures after which a record is dead-lettered
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: 30,
            max_delay_secs: 60 * 60,
            max_attempts: 10,
        }
    }
}

/// Retry bookkeeping for a record after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDecision {
    pub attempts: u32,
    pub next_attempt_at: Option<i64>,
    pub dead_lettered: bool,
}

impl RetryPolicy {
    /// Retry immediately and never dead-letter
    pub const fn immediate() -> Self {
        Self {
            base_delay_secs: 0,
            max_delay_secs: 0,
            max_attempts: u32::MAX,
        }
    }

    /// Delay before the next attempt once `attempts` failures happened
    ///
    /// `base * 2^(attempts - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempts - 1).min(32);
        let secs = self
            .base_delay_secs
            .saturating_mul(1_u64 << exponent)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }

    /// Bookkeeping for a record that had `previous_attempts` failures and
    /// just failed again at `now_ms`.
    pub fn on_failure(&self, previous_attempts: u32, now_ms: i64) -> FailureDecision {
        let attempts = previous_attempts.saturating_add(1);
        if attempts >= self.max_attempts {
            return FailureDecision {
                attempts,
                next_attempt_at: None,
                dead_lettered: true,
            };
        }

        let delay_ms = i64::try_from(self.delay_for(attempts).as_millis()).unwrap_or(i64::MAX);
        FailureDecision {
            attempts,
            next_attempt_at: Some(now_ms.saturating_add(delay_ms)),
            dead_lettered: false,
        }
    }
}
