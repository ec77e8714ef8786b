//! Retry policy: attempt budget and backoff delays for failed steps.

use std::time::Duration;

/// Retry policy for failed step attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per step, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
        }
    }

    /// Delay before the next retry, given the attempts already made (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1)
    ///
    /// With base_delay=2s, multiplier=2.0:
    /// - after attempt 1: 2s
    /// - after attempt 2: 4s
    /// - after attempt 3: 8s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 2s base, doubling.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), 2.0)
    }
}
