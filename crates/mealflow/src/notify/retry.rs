//! Retry policy for notification delivery.

use std::time::Duration;

/// Exponential backoff for failed deliveries.
///
/// The delay after failed attempt N is `min(base_delay * 2^(N-1), max_delay)`.
/// After `max_attempts` failures the notification is dead-lettered.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mealflow::notify::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 5);
/// assert_eq!(policy.backoff_duration(3), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up, the first one included. Default: 5.
    pub max_attempts: u32,

    /// Delay after the first failure; doubles on each retry. Default: 1 second.
    pub base_delay: Duration,

    /// Cap on the delay. Default: 5 minutes.
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
    /// Whether to try again after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// How long to wait after `attempt` (1-based) failed.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}
