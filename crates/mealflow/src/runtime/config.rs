//! Runtime configuration.

use std::time::Duration;

use crate::notify::RetryPolicy;

/// Configuration for the background runtime.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mealflow::runtime::RuntimeConfig;
///
/// let config = RuntimeConfig {
///     sweep_interval: Duration::from_secs(15 * 60),
///     notification_queue_capacity: 4096,
///     ..Default::default()
/// };
/// assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often the auto-cancel sweep runs.
    ///
    /// The first sweep runs as soon as the runtime starts. Default: 1 hour.
    pub sweep_interval: Duration,

    /// Notifications the queue holds before hand-offs start failing.
    ///
    /// Default: 1024.
    pub notification_queue_capacity: usize,

    /// Maximum time to wait for in-flight work during shutdown.
    ///
    /// After this timeout, the runtime will force stop.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,

    /// Backoff and attempt limit for failed deliveries.
    pub retry_policy: RetryPolicy,

    /// Identifier used in logs.
    ///
    /// If `None`, a UUID is generated when the runtime is built.
    pub worker_id: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60 * 60),
            notification_queue_capacity: 1024,
            shutdown_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            worker_id: None,
        }
    }
}
