//! The workflow subject: one request moving through its variant's table.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::actor::Actor;
use crate::audit::AuditTrail;
use crate::definition::{State, WorkflowVariant};
use crate::guard::{Priority, RequestType};

/// Unique identifier of a request (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Uuid);

impl SubjectId {
    /// Generate a new time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SubjectId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<SubjectId> for Uuid {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Extracts the subject a command or input targets.
///
/// Derive it with `#[derive(HasSubjectId)]` and `#[subject_id(field)]`.
pub trait HasSubjectId {
    fn subject_id(&self) -> SubjectId;
}

/// Identifier of a school, directorate, lot or vendor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstitutionId(String);

impl InstitutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstitutionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Snapshot of the institutions tied to a request when it was created.
///
/// Kept as-is for reporting even if the school later changes directorate
/// or vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionTrail {
    pub school: InstitutionId,
    pub dre: InstitutionId,
    pub lot: Option<InstitutionId>,
    pub vendor: Option<InstitutionId>,
}

/// Name of a meal/food type ("lanche", "refeição", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FoodType(String);

impl FoodType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for FoodType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One date a request covers. Cancelling is one-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateScopedItem {
    pub date: Date,
    pub cancelled: bool,
    pub cancelled_justification: Option<String>,
    pub cancelled_at: Option<OffsetDateTime>,
}

impl DateScopedItem {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            cancelled: false,
            cancelled_justification: None,
            cancelled_at: None,
        }
    }

    /// Mark cancelled. Returns `false` if it already was.
    pub(crate) fn cancel(&mut self, justification: &str, at: OffsetDateTime) -> bool {
        if self.cancelled {
            return false;
        }
        self.cancelled = true;
        self.cancelled_justification = Some(justification.to_string());
        self.cancelled_at = Some(at);
        true
    }
}

/// Type-specific request content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainPayload {
    MenuChange {
        reason: String,
        periods: Vec<String>,
        replaced: Vec<FoodType>,
        replacement: Vec<FoodType>,
    },
    MenuInversion {
        from: Date,
        to: Date,
        food_types: Vec<FoodType>,
    },
    FoodSuspension {
        reason: String,
        periods: Vec<String>,
        food_types: Vec<FoodType>,
    },
    FoodInclusion {
        reason: String,
        periods: Vec<String>,
        food_types: Vec<FoodType>,
        students: u32,
    },
    TourKit {
        location: String,
        students: u32,
        kits: Vec<String>,
    },
    SpecialDiet {
        student_code: String,
        diagnoses: Vec<String>,
        valid_until: Option<Date>,
    },
    InitialMeasurement {
        year: i32,
        month: u8,
    },
}

impl DomainPayload {
    /// Food types the request touches, used for duplicate detection.
    pub fn food_types(&self) -> Vec<FoodType> {
        match self {
            DomainPayload::MenuChange { replaced, .. } => replaced.clone(),
            DomainPayload::MenuInversion { food_types, .. }
            | DomainPayload::FoodSuspension { food_types, .. }
            | DomainPayload::FoodInclusion { food_types, .. } => food_types.clone(),
            DomainPayload::TourKit { kits, .. } => kits.iter().map(FoodType::new).collect(),
            DomainPayload::SpecialDiet { .. } | DomainPayload::InitialMeasurement { .. } => {
                Vec::new()
            }
        }
    }
}

/// Everything needed to open a new request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
    pub request_type: RequestType,
    pub trail: InstitutionTrail,
    pub dates: Vec<Date>,
    pub payload: DomainPayload,
}

/// A request and its lifecycle state.
///
/// The audit trail is loaded alongside the subject but stored separately;
/// it is not part of the serialized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub variant: WorkflowVariant,
    pub request_type: RequestType,
    pub current_state: State,
    /// Optimistic concurrency token, bumped on every save.
    pub version: u64,
    pub created_by: Actor,
    pub created_at: OffsetDateTime,
    pub trail: InstitutionTrail,
    /// Date-scoped items, kept sorted by date.
    pub children: Vec<DateScopedItem>,
    pub payload: DomainPayload,
    /// Set when the request is submitted.
    pub priority: Option<Priority>,
    #[serde(skip)]
    pub audit: AuditTrail,
}

impl Subject {
    /// Build a subject in `initial` state with its children attached.
    ///
    /// Duplicate dates collapse into one child.
    pub fn open(
        id: SubjectId,
        new: NewSubject,
        initial: State,
        created_by: Actor,
        created_at: OffsetDateTime,
    ) -> Self {
        let dates: BTreeSet<Date> = new.dates.into_iter().collect();
        Self {
            id,
            variant: new.request_type.variant(),
            request_type: new.request_type,
            current_state: initial,
            version: 0,
            created_by,
            created_at,
            trail: new.trail,
            children: dates.into_iter().map(DateScopedItem::new).collect(),
            payload: new.payload,
            priority: None,
            audit: AuditTrail::default(),
        }
    }

    pub fn dates(&self) -> Vec<Date> {
        self.children.iter().map(|c| c.date).collect()
    }

    /// Dates not yet cancelled.
    pub fn active_dates(&self) -> Vec<Date> {
        self.children
            .iter()
            .filter(|c| !c.cancelled)
            .map(|c| c.date)
            .collect()
    }

    pub fn first_date(&self) -> Option<Date> {
        self.children.first().map(|c| c.date)
    }

    pub fn last_date(&self) -> Option<Date> {
        self.children.last().map(|c| c.date)
    }

    pub fn child(&self, date: Date) -> Option<&DateScopedItem> {
        self.children.iter().find(|c| c.date == date)
    }

    pub fn all_cancelled(&self) -> bool {
        self.children.iter().all(|c| c.cancelled)
    }

    /// Submitted inside the priority or limit notice bands.
    pub fn requested_late(&self) -> bool {
        self.priority.is_some_and(|p| p.is_late())
    }

    pub fn food_types(&self) -> Vec<FoodType> {
        self.payload.food_types()
    }

    /// Cancel the given dates, returning the ones that actually changed.
    pub(crate) fn cancel_dates(
        &mut self,
        dates: &[Date],
        justification: &str,
        at: OffsetDateTime,
    ) -> Vec<Date> {
        self.children
            .iter_mut()
            .filter(|c| dates.contains(&c.date))
            .filter_map(|c| c.cancel(justification, at).then_some(c.date))
            .collect()
    }
}

impl HasSubjectId for Subject {
    fn subject_id(&self) -> SubjectId {
        self.id
    }
}
