//! Reconnection backoff for the watch loop.
//!
//! Delays start at `initial` and double after every consecutive failure, capped
//! at `max`. Setting `max` equal to `initial` gives a fixed retry interval.

use std::time::Duration;

/// How long to wait between reconnection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Capped exponential backoff
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// The same delay before every attempt
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            max: interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(
            Duration::from_secs(super::config::INITIAL_BACKOFF_SECONDS),
            Duration::from_secs(super::config::MAX_BACKOFF_SECONDS),
        )
    }
}

/// Consecutive failures and the delay to apply before the next attempt
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    consecutive_failures: u32,
    next_delay: Duration,
}

impl RetryState {
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
            next_delay: policy.initial,
        }
    }

    /// Record a failed attempt and return how long to wait before the next one
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.next_delay;
        self.next_delay = self.next_delay.saturating_mul(2).min(self.policy.max);
        delay
    }

    /// Forget past failures; called when a productive session ends
    pub const fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.next_delay = self.policy.initial;
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn next_delay(&self) -> Duration {
        self.next_delay
    }
}
