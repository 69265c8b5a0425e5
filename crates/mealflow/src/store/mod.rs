//! Storage abstraction for requests and their audit trails.
//!
//! - [`SubjectStore`]: load and atomically save one subject with its audit entry
//! - [`SubjectQueryStore`]: read-only searches used by guards and sweeps
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: in-process storage for embedding and tests
//! - [`PgStore`]: PostgreSQL storage for production (requires `postgres` feature)

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::future::Future;

use async_trait::async_trait;
use time::Date;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use crate::audit::AuditEntry;
use crate::definition::{State, WorkflowVariant};
use crate::error::Result;
use crate::guard::RequestType;
use crate::subject::{InstitutionId, Subject, SubjectId};

/// Storage backend for subjects.
///
/// A subject and its audit trail are one unit: [`save`](Self::save) must
/// persist the new document and append the audit entry together, or do
/// neither. The optimistic version check is the only concurrency control;
/// there is no cross-subject locking.
pub trait SubjectStore: Send + Sync + Clone + 'static {
    /// Store a newly created subject (version 0, empty trail).
    ///
    /// Fails with [`Error::DuplicateSubject`](crate::Error::DuplicateSubject)
    /// if the id is taken.
    fn insert(&self, subject: &Subject) -> impl Future<Output = Result<()>> + Send;

    /// Load a subject with its audit trail attached.
    fn load(&self, id: SubjectId) -> impl Future<Output = Result<Subject>> + Send;

    /// Persist `subject` and append `entry`, atomically.
    ///
    /// The stored version must still be `expected_version`; otherwise nothing
    /// is written and
    /// [`Error::ConcurrentModification`](crate::Error::ConcurrentModification)
    /// is returned. If the audit entry cannot be written the subject is not
    /// updated either and the call fails with
    /// [`Error::AuditWriteFailure`](crate::Error::AuditWriteFailure).
    fn save(
        &self,
        subject: &Subject,
        expected_version: u64,
        entry: &AuditEntry,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Subjects of one school and request type whose dates may overlap a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateScope {
    pub school: InstitutionId,
    pub request_type: RequestType,
    pub first: Date,
    pub last: Date,
    /// Subject to leave out, usually the one being checked.
    pub exclude: Option<SubjectId>,
}

/// Read-only searches across subjects.
///
/// Results carry the subject document only; the audit trail is left empty.
/// Reads take no locks, so results can be stale by the time they are used.
#[async_trait]
pub trait SubjectQueryStore: Send + Sync + Clone + 'static {
    /// Subjects matching `scope` whose first..=last date range overlaps
    /// `scope.first..=scope.last`, in any state.
    async fn find_overlapping(&self, scope: &DuplicateScope) -> Result<Vec<Subject>>;

    /// Subjects of `variant` in one of `states` whose last date is before
    /// `before`.
    async fn list_elapsed(
        &self,
        variant: WorkflowVariant,
        states: &[State],
        before: Date,
    ) -> Result<Vec<Subject>>;

    /// Every subject of `request_type`, oldest first.
    async fn list_by_request_type(&self, request_type: RequestType) -> Result<Vec<Subject>>;

    /// Audit entries of a subject, ordered by sequence.
    async fn fetch_audit(&self, id: SubjectId) -> Result<Vec<AuditEntry>>;
}
