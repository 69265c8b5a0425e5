//! In-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::Date;

use super::{DuplicateScope, SubjectQueryStore, SubjectStore};
use crate::audit::{AuditEntry, AuditTrail};
use crate::definition::{State, WorkflowVariant};
use crate::error::{Error, Result};
use crate::guard::RequestType;
use crate::subject::{Subject, SubjectId};

/// Store keeping every subject in process memory.
///
/// Cloning shares the same data. A single mutex serializes writes, and the
/// version check still applies, so concurrent services sharing one store see
/// the same conflicts they would against a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    subjects: HashMap<SubjectId, Subject>,
    audit: HashMap<SubjectId, Vec<AuditEntry>>,
    fail_next_audit_write: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`save`](SubjectStore::save) fail as if the audit write
    /// had been rejected. Used to exercise rollback.
    pub fn fail_next_audit_write(&self) {
        self.lock().fail_next_audit_write = true;
    }

    /// Number of stored subjects.
    pub fn len(&self) -> usize {
        self.lock().subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(&self, keep: impl Fn(&Subject) -> bool) -> Vec<Subject> {
        let inner = self.lock();
        let mut found: Vec<Subject> = inner
            .subjects
            .values()
            .filter(|s| keep(s))
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.created_at, s.id));
        found
    }
}

impl Inner {
    fn save(&mut self, subject: &Subject, expected_version: u64, entry: &AuditEntry) -> Result<()> {
        let stored = self
            .subjects
            .get(&subject.id)
            .ok_or(Error::SubjectNotFound(subject.id))?;
        if stored.version != expected_version {
            return Err(Error::ConcurrentModification {
                subject_id: subject.id,
                expected_version,
            });
        }

        if std::mem::take(&mut self.fail_next_audit_write) {
            return Err(Error::AuditWriteFailure(format!(
                "audit entry {} of {} was rejected",
                entry.sequence, subject.id
            )));
        }
        let trail = self.audit.entry(subject.id).or_default();
        let next = trail.last().map_or(1, |e| e.sequence + 1);
        if entry.subject_id != subject.id || entry.sequence != next {
            return Err(Error::AuditWriteFailure(format!(
                "audit entry {} of {} does not follow sequence {}",
                entry.sequence,
                entry.subject_id,
                next - 1
            )));
        }

        trail.push(entry.clone());
        let mut document = subject.clone();
        document.audit = AuditTrail::default();
        self.subjects.insert(subject.id, document);
        Ok(())
    }
}

impl SubjectStore for MemoryStore {
    async fn insert(&self, subject: &Subject) -> Result<()> {
        let mut inner = self.lock();
        if inner.subjects.contains_key(&subject.id) {
            return Err(Error::DuplicateSubject(subject.id));
        }
        let mut document = subject.clone();
        document.audit = AuditTrail::default();
        inner.subjects.insert(subject.id, document);
        Ok(())
    }

    async fn load(&self, id: SubjectId) -> Result<Subject> {
        let inner = self.lock();
        let mut subject = inner
            .subjects
            .get(&id)
            .cloned()
            .ok_or(Error::SubjectNotFound(id))?;
        let entries = inner.audit.get(&id).cloned().unwrap_or_default();
        subject.audit = AuditTrail::from_entries(entries);
        Ok(subject)
    }

    async fn save(&self, subject: &Subject, expected_version: u64, entry: &AuditEntry) -> Result<()> {
        self.lock().save(subject, expected_version, entry)
    }
}

#[async_trait]
impl SubjectQueryStore for MemoryStore {
    async fn find_overlapping(&self, scope: &DuplicateScope) -> Result<Vec<Subject>> {
        Ok(self.select(|s| {
            s.trail.school == scope.school
                && s.request_type == scope.request_type
                && Some(s.id) != scope.exclude
                && match (s.first_date(), s.last_date()) {
                    (Some(first), Some(last)) => first <= scope.last && last >= scope.first,
                    _ => false,
                }
        }))
    }

    async fn list_elapsed(
        &self,
        variant: WorkflowVariant,
        states: &[State],
        before: Date,
    ) -> Result<Vec<Subject>> {
        Ok(self.select(|s| {
            s.variant == variant
                && states.contains(&s.current_state)
                && s.last_date().is_some_and(|last| last < before)
        }))
    }

    async fn list_by_request_type(&self, request_type: RequestType) -> Result<Vec<Subject>> {
        Ok(self.select(|s| s.request_type == request_type))
    }

    async fn fetch_audit(&self, id: SubjectId) -> Result<Vec<AuditEntry>> {
        let inner = self.lock();
        if !inner.subjects.contains_key(&id) {
            return Err(Error::SubjectNotFound(id));
        }
        Ok(inner.audit.get(&id).cloned().unwrap_or_default())
    }
}
