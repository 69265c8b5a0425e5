//! Delivery metadata handed to notification handlers.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::subject::SubjectId;

/// Context for one delivery attempt.
///
/// Delivery is at-least-once: a handler may see the same notification again
/// after a failure. Pass [`idempotency_key()`](Self::idempotency_key) to
/// transports that can deduplicate.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    /// Identifier of the queued notification, stable across attempts.
    pub delivery_id: Uuid,

    pub subject_id: SubjectId,

    /// Current attempt number (1-based).
    pub attempt: u32,

    /// When the notification entered the queue.
    pub enqueued_at: OffsetDateTime,
}

impl DeliveryContext {
    pub fn new(
        delivery_id: Uuid,
        subject_id: SubjectId,
        attempt: u32,
        enqueued_at: OffsetDateTime,
    ) -> Self {
        Self {
            delivery_id,
            subject_id,
            attempt,
            enqueued_at,
        }
    }

    /// `{subject_id}:{delivery_id}`, identical for every attempt.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.subject_id, self.delivery_id)
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}
