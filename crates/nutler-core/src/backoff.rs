//! Reconnection backoff policy.
//!
//! Attempt `n` (1-based) waits `initial_delay * 2^(n-1)`. Once `n` exceeds
//! `max_attempts` the policy yields nothing and the caller gives up.

use std::time::Duration;

/// Delay before the first reconnection attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Reconnection attempts before the link is declared lost.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before attempt 1
    pub initial_delay: Duration,
    /// Last attempt that is still scheduled
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_delay: DEFAULT_INITIAL_DELAY, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl BackoffPolicy {
    /// Create a policy.
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self { initial_delay, max_attempts }
    }

    /// Delay before `attempt`, or `None` once the budget is spent.
    ///
    /// Attempt 0 is not a retry and yields `None`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1)?;
        self.initial_delay.checked_mul(factor)
    }

    /// Every delay the policy will ever produce, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map_while(|attempt| self.next_delay(attempt)).collect()
    }
}
