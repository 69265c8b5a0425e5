//! Notification worker draining the in-process queue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::HasSubjectId;
use crate::clock::Clock;
use crate::notify::handler::ErasedHandler;
use crate::notify::{
    DeliveryContext, Notification, NotificationQueue, QueuedNotification, RetryPolicy,
};

/// A notification that exhausted its delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub id: Uuid,
    pub notification: Notification,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: OffsetDateTime,
}

/// Shared list of dead letters.
///
/// Cloning shares the list, so a handle taken before the runtime starts
/// sees what the worker parks there.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterQueue {
    inner: Arc<Mutex<Vec<DeadLetter>>>,
}

impl DeadLetterQueue {
    fn lock(&self) -> MutexGuard<'_, Vec<DeadLetter>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, letter: DeadLetter) {
        self.lock().push(letter);
    }

    /// Snapshot of the current dead letters, oldest first.
    pub fn list(&self) -> Vec<DeadLetter> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every dead letter, e.g. to re-dispatch them.
    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.lock())
    }
}

/// Worker that delivers queued notifications one at a time.
///
/// # Lifecycle
///
/// 1. Wait for the next queued notification
/// 2. Call the handler with a fresh [`DeliveryContext`]
/// 3. On failure, sleep for the policy's backoff and try again
/// 4. After `max_attempts` failures, park it in the dead-letter queue
/// 5. On shutdown, close the queue and make one attempt at everything
///    still in it
pub(crate) struct NotificationWorker {
    queue: NotificationQueue,
    handler: Arc<dyn ErasedHandler>,
    retry_policy: RetryPolicy,
    dead_letters: DeadLetterQueue,
    clock: Arc<dyn Clock>,
    worker_id: String,
}

impl NotificationWorker {
    pub fn new(
        queue: NotificationQueue,
        handler: Arc<dyn ErasedHandler>,
        retry_policy: RetryPolicy,
        dead_letters: DeadLetterQueue,
        clock: Arc<dyn Clock>,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            handler,
            retry_policy,
            dead_letters,
            clock,
            worker_id,
        }
    }

    /// Run until the shutdown signal, or until every dispatcher is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.worker_id, "Notification worker started");

        loop {
            tokio::select! {
                queued = self.queue.recv() => {
                    let Some(queued) = queued else {
                        info!(worker_id = %self.worker_id, "Notification queue closed");
                        return;
                    };
                    self.deliver(queued, self.retry_policy.max_attempts).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(worker_id = %self.worker_id, "Notification worker shutting down");
                        break;
                    }
                }
            }
        }

        self.queue.close();
        let mut drained = 0usize;
        while let Some(queued) = self.queue.try_recv() {
            self.deliver(queued, 1).await;
            drained += 1;
        }
        if drained > 0 {
            info!(worker_id = %self.worker_id, drained, "Drained notification queue");
        }
    }

    /// Deliver with up to `max_attempts` attempts.
    async fn deliver(&self, queued: QueuedNotification, max_attempts: u32) {
        let subject_id = queued.notification.subject_id();
        let mut attempt = 1;

        loop {
            let ctx = DeliveryContext::new(queued.id, subject_id, attempt, queued.enqueued_at);
            let error = match self.handler.deliver(&queued.notification, &ctx).await {
                Ok(()) => {
                    debug!(delivery_id = %queued.id, attempt, "Notification delivered");
                    return;
                }
                Err(error) => error,
            };

            if attempt >= max_attempts || !self.retry_policy.should_retry(attempt) {
                warn!(
                    delivery_id = %queued.id,
                    subject_id = %subject_id,
                    error = %error,
                    attempts = attempt,
                    "Notification exceeded max retries, moving to dead letter"
                );
                self.dead_letters.push(DeadLetter {
                    id: queued.id,
                    notification: queued.notification,
                    attempts: attempt,
                    last_error: error,
                    failed_at: self.clock.now(),
                });
                return;
            }

            debug!(
                delivery_id = %queued.id,
                error = %error,
                attempt,
                "Notification delivery failed, will retry"
            );
            tokio::time::sleep(self.retry_policy.backoff_duration(attempt)).await;
            attempt += 1;
        }
    }
}
