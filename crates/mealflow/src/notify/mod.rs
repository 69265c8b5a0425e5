//! Best-effort delivery of state-change and partial-cancellation events.
//!
//! - [`Notification`]: the event handed to the dispatcher, with its audience
//! - [`NotificationDispatcher`]: fire-and-forget sink used by the service
//! - [`QueuedDispatcher`]: bounded in-process queue drained by the runtime
//! - [`NotificationHandler`]: user-supplied transport (email, push, ...)
//! - [`DeliveryContext`]: attempt and idempotency metadata per delivery
//! - [`RetryPolicy`]: exponential backoff before a delivery is dead-lettered

mod context;
mod dispatcher;
mod event;
pub(crate) mod handler;
mod retry;

pub use context::DeliveryContext;
pub use dispatcher::{
    DispatchError, NoopDispatcher, NotificationDispatcher, NotificationQueue, QueuedDispatcher,
    QueuedNotification,
};
pub use event::{Audience, Notification, audience_for, counterpart};
pub use handler::NotificationHandler;
pub use retry::RetryPolicy;
