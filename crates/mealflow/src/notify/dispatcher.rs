//! Dispatchers: where the service hands notifications off.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::Notification;
use crate::clock::Clock;

/// Why a notification could not be handed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("notification queue is full")]
    QueueFull,
    #[error("notification queue is closed")]
    Closed,
}

/// Fire-and-forget notification sink.
///
/// `notify` must not block: the caller is a committed transition that has
/// already returned its result. Delivery itself happens elsewhere; an error
/// here only means the hand-off failed, and the service logs it and moves on.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), DispatchError>;
}

impl<D: NotificationDispatcher + ?Sized> NotificationDispatcher for Arc<D> {
    fn notify(&self, notification: Notification) -> Result<(), DispatchError> {
        (**self).notify(notification)
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl NotificationDispatcher for NoopDispatcher {
    fn notify(&self, _notification: Notification) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// A notification waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNotification {
    /// Stable across delivery attempts (UUID v7).
    pub id: Uuid,
    pub notification: Notification,
    pub enqueued_at: OffsetDateTime,
}

/// Dispatcher backed by a bounded in-process queue.
///
/// Hand-off uses `try_send`, so a full queue fails fast with
/// [`DispatchError::QueueFull`] instead of blocking the transition.
/// Enqueue times come from the engine's [`Clock`].
#[derive(Clone)]
pub struct QueuedDispatcher {
    tx: mpsc::Sender<QueuedNotification>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for QueuedDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedDispatcher")
            .field("capacity", &self.tx.max_capacity())
            .finish_non_exhaustive()
    }
}

/// Receiving end of a [`QueuedDispatcher`], drained by the runtime.
#[derive(Debug)]
pub struct NotificationQueue {
    rx: mpsc::Receiver<QueuedNotification>,
}

impl QueuedDispatcher {
    /// Create a dispatcher and the queue it feeds.
    pub fn channel(capacity: usize, clock: Arc<dyn Clock>) -> (Self, NotificationQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, clock }, NotificationQueue { rx })
    }
}

impl NotificationDispatcher for QueuedDispatcher {
    fn notify(&self, notification: Notification) -> Result<(), DispatchError> {
        let queued = QueuedNotification {
            id: Uuid::now_v7(),
            notification,
            enqueued_at: self.clock.now(),
        };
        self.tx.try_send(queued).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

impl NotificationQueue {
    /// Wait for the next notification. `None` once every dispatcher is gone.
    pub async fn recv(&mut self) -> Option<QueuedNotification> {
        self.rx.recv().await
    }

    /// Take a notification if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<QueuedNotification> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new notifications; queued ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
