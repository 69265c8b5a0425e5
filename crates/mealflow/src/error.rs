//! Error types for mealflow.

use thiserror::Error;
use time::Date;

use crate::actor::Role;
use crate::definition::{Action, State, WorkflowVariant};
use crate::guard::GuardViolation;
use crate::subject::SubjectId;

/// A `Result` alias with [`enum@Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mealflow operations.
///
/// Every kind except [`Error::AuditWriteFailure`] and the storage plumbing
/// kinds is caller-correctable and leaves the subject untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// The variant's table has no edge for `action` out of `state`.
    #[error("no transition for action {action} from state {state}")]
    InvalidTransition { state: State, action: Action },

    /// The edge exists but the actor's role is not allowed to take it.
    #[error("role {role} may not perform {action}")]
    UnauthorizedActor { role: Role, action: Action },

    /// A precondition check rejected the operation.
    #[error("guard violation: {0}")]
    GuardViolation(#[from] GuardViolation),

    /// The date is too close (or already past) to be cancelled.
    #[error("cancellation window closed for {date}")]
    CancellationWindowClosed { date: Date },

    /// Another writer saved the subject after it was loaded.
    #[error("subject {subject_id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        subject_id: SubjectId,
        expected_version: u64,
    },

    /// The audit entry could not be persisted; the state change was rolled back.
    #[error("audit write failed: {0}")]
    AuditWriteFailure(String),

    #[error("subject not found: {0}")]
    SubjectNotFound(SubjectId),

    #[error("subject already exists: {0}")]
    DuplicateSubject(SubjectId),

    /// A date named in a cancellation does not belong to the request.
    #[error("date {date} is not part of subject {subject_id}")]
    DateNotInRequest { subject_id: SubjectId, date: Date },

    #[error("no dates given to cancel")]
    NoDatesToCancel,

    /// Variant has no registered transition table.
    #[error("unknown workflow variant: {0}")]
    UnknownVariant(WorkflowVariant),

    /// Variant was registered more than once.
    #[error("duplicate workflow variant registration: {0}")]
    DuplicateVariant(WorkflowVariant),

    /// A transition table failed validation while being built.
    #[error("invalid definition for {variant}: {reason}")]
    InvalidDefinition {
        variant: WorkflowVariant,
        reason: String,
    },

    /// An administrative override was rejected.
    #[error("invalid override: {0}")]
    InvalidOverride(String),

    /// Engine configuration with values no calendar can honour.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Measurement period with a month outside 1..=12.
    #[error("invalid measurement period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u8 },

    /// Failed to serialize or deserialize a stored document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// PostgreSQL storage error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
}

impl Error {
    /// Returns `true` if the caller can correct the request and try again.
    ///
    /// Background sweeps log and skip every error; interactive callers surface
    /// recoverable errors verbatim and treat the rest as internal failures.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::AuditWriteFailure(_) | Error::Serialization(_) => false,
            #[cfg(feature = "postgres")]
            Error::Postgres(_) => false,
            _ => true,
        }
    }

    pub(crate) fn invalid_definition(variant: WorkflowVariant, reason: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            variant,
            reason: reason.into(),
        }
    }
}
