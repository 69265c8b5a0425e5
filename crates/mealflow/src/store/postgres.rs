//! PostgreSQL store implementation.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::Date;
use uuid::Uuid;

use super::{DuplicateScope, SubjectQueryStore, SubjectStore};
use crate::audit::{AuditEntry, AuditTrail};
use crate::definition::{State, WorkflowVariant};
use crate::error::{Error, Result};
use crate::guard::RequestType;
use crate::subject::{Subject, SubjectId};

/// PostgreSQL-backed store for production use.
///
/// Subjects are stored as JSONB documents next to a `version` column.
/// [`save`](SubjectStore::save) updates the row only while the version still
/// matches and appends the audit entry in the same transaction.
///
/// # Database Schema
///
/// Requires tables in the `mealflow` schema (see `migrations/`):
///
/// | Table           | Purpose                                                   |
/// |-----------------|-----------------------------------------------------------|
/// | `subjects`      | Subject documents, status and version                     |
/// | `audit_entries` | Append-only audit trail; a trigger rejects UPDATE/DELETE  |
///
/// # Concurrency
///
/// Two saves racing on the same subject serialize on the row lock taken by
/// the `UPDATE`; the loser finds the version changed and fails with
/// [`Error::ConcurrentModification`].
///
/// # Example
///
/// ```ignore
/// use mealflow::{PgStore, WorkflowService};
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://...").await?;
/// let service = WorkflowService::builder(PgStore::new(pool)).build_service()?;
/// ```
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PostgreSQL store from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, id: SubjectId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM mealflow.subjects WHERE id = $1")
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn audit_entries(&self, id: SubjectId) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT payload
            FROM mealflow.audit_entries
            WHERE subject_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<AuditEntry> {
                let payload: Value = row.try_get("payload")?;
                Ok(serde_json::from_value(payload)?)
            })
            .collect()
    }
}

fn decode_subject(row: &PgRow) -> Result<Subject> {
    let document: Value = row.try_get("document")?;
    let version: i64 = row.try_get("version")?;
    let mut subject: Subject = serde_json::from_value(document)?;
    subject.version = version as u64;
    Ok(subject)
}

fn document(subject: &Subject) -> Result<Value> {
    Ok(serde_json::to_value(subject)?)
}

impl SubjectStore for PgStore {
    async fn insert(&self, subject: &Subject) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO mealflow.subjects
                (id, variant, request_type, status, version, school_id,
                 first_date, last_date, document, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(subject.id))
        .bind(subject.variant.as_str())
        .bind(subject.request_type.as_str())
        .bind(subject.current_state.as_str())
        .bind(subject.version as i64)
        .bind(subject.trail.school.as_str())
        .bind(subject.first_date())
        .bind(subject.last_date())
        .bind(document(subject)?)
        .bind(subject.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::DuplicateSubject(subject.id));
        }
        Ok(())
    }

    async fn load(&self, id: SubjectId) -> Result<Subject> {
        let row = sqlx::query("SELECT document, version FROM mealflow.subjects WHERE id = $1")
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::SubjectNotFound(id))?;

        let mut subject = decode_subject(&row)?;
        subject.audit = AuditTrail::from_entries(self.audit_entries(id).await?);
        Ok(subject)
    }

    async fn save(&self, subject: &Subject, expected_version: u64, entry: &AuditEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::from(subject.id);

        let updated = sqlx::query(
            r#"
            UPDATE mealflow.subjects
            SET status = $2, version = $3, document = $4, updated_at = now()
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(id)
        .bind(subject.current_state.as_str())
        .bind(subject.version as i64)
        .bind(document(subject)?)
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM mealflow.subjects WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            // Transaction is rolled back on drop
            return Err(if exists {
                Error::ConcurrentModification {
                    subject_id: subject.id,
                    expected_version,
                }
            } else {
                Error::SubjectNotFound(subject.id)
            });
        }

        let payload = serde_json::to_value(entry)?;
        sqlx::query(
            r#"
            INSERT INTO mealflow.audit_entries
                (subject_id, sequence, action, resulting_state, recorded_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(entry.sequence as i64)
        .bind(entry.action.as_str())
        .bind(entry.resulting_state.as_str())
        .bind(entry.timestamp)
        .bind(payload)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::AuditWriteFailure(e.to_string()))?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl SubjectQueryStore for PgStore {
    async fn find_overlapping(&self, scope: &DuplicateScope) -> Result<Vec<Subject>> {
        let rows = sqlx::query(
            r#"
            SELECT document, version
            FROM mealflow.subjects
            WHERE school_id = $1
              AND request_type = $2
              AND first_date <= $4
              AND last_date >= $3
              AND ($5::uuid IS NULL OR id <> $5)
            ORDER BY created_at, id
            "#,
        )
        .bind(scope.school.as_str())
        .bind(scope.request_type.as_str())
        .bind(scope.first)
        .bind(scope.last)
        .bind(scope.exclude.map(Uuid::from))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_subject).collect()
    }

    async fn list_elapsed(
        &self,
        variant: WorkflowVariant,
        states: &[State],
        before: Date,
    ) -> Result<Vec<Subject>> {
        let statuses: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
        let rows = sqlx::query(
            r#"
            SELECT document, version
            FROM mealflow.subjects
            WHERE variant = $1
              AND status = ANY($2)
              AND last_date < $3
            ORDER BY created_at, id
            "#,
        )
        .bind(variant.as_str())
        .bind(statuses)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_subject).collect()
    }

    async fn list_by_request_type(&self, request_type: RequestType) -> Result<Vec<Subject>> {
        let rows = sqlx::query(
            r#"
            SELECT document, version
            FROM mealflow.subjects
            WHERE request_type = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(request_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_subject).collect()
    }

    async fn fetch_audit(&self, id: SubjectId) -> Result<Vec<AuditEntry>> {
        if !self.exists(id).await? {
            return Err(Error::SubjectNotFound(id));
        }
        self.audit_entries(id).await
    }
}
