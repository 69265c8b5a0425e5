//! Periodic auto-cancel sweep.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use super::RuntimeConfig;
use crate::service::WorkflowService;
use crate::store::{SubjectQueryStore, SubjectStore};

/// Worker that runs [`WorkflowService::auto_cancel_elapsed`] every
/// `sweep_interval`.
pub(crate) struct SweepWorker<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    service: Arc<WorkflowService<S>>,
    config: RuntimeConfig,
    worker_id: String,
}

impl<S> SweepWorker<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    pub fn new(service: Arc<WorkflowService<S>>, config: RuntimeConfig, worker_id: String) -> Self {
        Self {
            service,
            config,
            worker_id,
        }
    }

    /// Run sweeps until the shutdown signal. A sweep in progress finishes
    /// before the worker exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticks = interval(self.config.sweep_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(worker_id = %self.worker_id, "Sweep worker started");

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if let Err(e) = self.service.auto_cancel_elapsed().await {
                        error!(worker_id = %self.worker_id, error = %e, "Auto-cancel sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(worker_id = %self.worker_id, "Sweep worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
