//! Background runtime: notification delivery and periodic sweeps.
//!
//! - [`WorkflowRuntime`]: coordinator that runs the workers
//! - [`WorkflowBuilder`]: builder for the service, runtime or both
//! - [`RuntimeConfig`]: sweep interval, queue size, retries, shutdown timeout
//! - [`DeadLetterQueue`]: notifications that exhausted their retries
//!
//! # Example
//!
//! ```ignore
//! use mealflow::runtime::{RuntimeConfig, WorkflowRuntime};
//!
//! let runtime = WorkflowRuntime::builder(store)
//!     .handler(email_handler)
//!     .runtime_config(RuntimeConfig::default())
//!     .build_runtime()?;
//!
//! runtime.run(shutdown_signal).await?;
//! ```

mod builder;
mod config;
mod notification_worker;
mod sweep_worker;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

pub use builder::WorkflowBuilder;
pub use config::RuntimeConfig;
pub use notification_worker::{DeadLetter, DeadLetterQueue};

use crate::error::Result;
use crate::notify::handler::ErasedHandler;
use crate::notify::NotificationQueue;
use crate::service::WorkflowService;
use crate::store::{SubjectQueryStore, SubjectStore};
use notification_worker::NotificationWorker;
use sweep_worker::SweepWorker;

/// Background runtime.
///
/// Runs a notification worker draining the built-in queue (when the builder
/// created one) and a sweep worker auto-cancelling elapsed requests.
///
/// # Lifecycle
///
/// 1. Create with [`WorkflowRuntime::builder(store)`](Self::builder)
/// 2. Configure and build with [`WorkflowBuilder::build_runtime()`]
/// 3. Keep a [`dead_letters()`](Self::dead_letters) handle if you need one
/// 4. Run with [`WorkflowRuntime::run()`] until the shutdown future completes
pub struct WorkflowRuntime<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    service: Arc<WorkflowService<S>>,
    queue: Option<NotificationQueue>,
    handler: Arc<dyn ErasedHandler>,
    config: RuntimeConfig,
    worker_id: String,
    dead_letters: DeadLetterQueue,
}

impl<S> WorkflowRuntime<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    /// Create a new runtime builder.
    pub fn builder(store: S) -> WorkflowBuilder<S> {
        WorkflowBuilder::new(store)
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Returns the worker identifier.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Returns the workflow service handle.
    pub fn service(&self) -> &Arc<WorkflowService<S>> {
        &self.service
    }

    /// Handle on the dead-letter list; stays valid after `run` consumes the
    /// runtime.
    pub fn dead_letters(&self) -> DeadLetterQueue {
        self.dead_letters.clone()
    }

    /// Run the workers until `shutdown` completes.
    ///
    /// # Shutdown Behavior
    ///
    /// When the shutdown future completes:
    /// 1. The sweep worker finishes its current sweep and stops
    /// 2. The notification worker stops taking new notifications and makes
    ///    one delivery attempt for each one still queued
    /// 3. The call returns once both are done, or after `shutdown_timeout`
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            worker_id = %self.worker_id,
            notifications = self.queue.is_some(),
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "Runtime starting"
        );

        let mut worker_handles = Vec::new();

        if let Some(queue) = self.queue {
            let worker = NotificationWorker::new(
                queue,
                Arc::clone(&self.handler),
                self.config.retry_policy.clone(),
                self.dead_letters.clone(),
                self.service.clock(),
                format!("{}-notify", self.worker_id),
            );
            let rx = shutdown_rx.clone();
            worker_handles.push(tokio::spawn(async move {
                worker.run(rx).await;
            }));
        }

        let sweeper = SweepWorker::new(
            Arc::clone(&self.service),
            self.config.clone(),
            format!("{}-sweep", self.worker_id),
        );
        let rx = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            sweeper.run(rx).await;
        }));

        // Wait for shutdown signal
        shutdown.await;

        // Signal shutdown to all workers
        let _ = shutdown_tx.send(true);

        let shutdown_timeout = self.config.shutdown_timeout;
        let all_workers = async {
            for handle in worker_handles {
                let _ = handle.await;
            }
        };

        match tokio::time::timeout(shutdown_timeout, all_workers).await {
            Ok(()) => {
                info!(worker_id = %self.worker_id, "Runtime stopped gracefully");
            }
            Err(_) => {
                warn!(
                    worker_id = %self.worker_id,
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Shutdown timeout exceeded, forcing stop"
                );
            }
        }

        Ok(())
    }
}
