//! Notification handler trait: the delivery transport.

use async_trait::async_trait;
use tracing::warn;

use super::context::DeliveryContext;
use super::Notification;
use crate::HasSubjectId;

/// Delivers notifications to people.
///
/// Implement this for the transport the host application uses (email, push,
/// an HTTP webhook). The runtime calls it once per queued notification.
///
/// # Results
///
/// | Result | Meaning |
/// |--------|---------|
/// | `Ok(())` | Delivered |
/// | `Err(_)` | Failed; retried with backoff, then dead-lettered |
///
/// A failed delivery never affects the request: its transition committed
/// before the notification was queued.
///
/// # Example
///
/// ```ignore
/// struct EmailHandler {
///     mailer: Mailer,
///     directory: Directory,
/// }
///
/// #[async_trait]
/// impl NotificationHandler for EmailHandler {
///     type Error = anyhow::Error;
///
///     async fn handle(&self, notification: &Notification, ctx: &DeliveryContext) -> Result<(), Self::Error> {
///         for audience in notification.audience() {
///             let to = self.directory.address(notification, *audience).await?;
///             self.mailer.send(&to, notification, ctx.idempotency_key()).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait NotificationHandler: Send + Sync + 'static {
    /// Must implement `Display` so failures can be kept in the dead-letter list.
    type Error: std::fmt::Display + Send + 'static;

    async fn handle(
        &self,
        notification: &Notification,
        ctx: &DeliveryContext,
    ) -> Result<(), Self::Error>;
}

/// Object-safe view of a [`NotificationHandler`] used by the runtime.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    /// Errors come back as strings for the dead-letter list.
    async fn deliver(&self, notification: &Notification, ctx: &DeliveryContext)
    -> Result<(), String>;
}

#[async_trait]
impl<H: NotificationHandler> ErasedHandler for H {
    async fn deliver(
        &self,
        notification: &Notification,
        ctx: &DeliveryContext,
    ) -> Result<(), String> {
        self.handle(notification, ctx)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Handler used when the runtime is built without one.
#[derive(Debug, Default)]
pub(crate) struct NoopHandler;

#[derive(Debug)]
pub struct NoopHandlerError;

impl std::fmt::Display for NoopHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("noop handler does not fail")
    }
}

impl std::error::Error for NoopHandlerError {}

#[async_trait]
impl NotificationHandler for NoopHandler {
    type Error = NoopHandlerError;

    async fn handle(
        &self,
        notification: &Notification,
        _ctx: &DeliveryContext,
    ) -> Result<(), Self::Error> {
        warn!(
            subject_id = %notification.subject_id(),
            kind = notification.kind(),
            "NoopHandler dropped a notification; no handler is configured"
        );
        Ok(())
    }
}
