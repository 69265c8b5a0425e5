//! Precondition checks run before a creation or transition is accepted.
//!
//! Guards are pure: each one reads a [`GuardContext`] and either passes or
//! reports a [`GuardViolation`]. The only outside data they see comes from the
//! [`Calendar`] collaborator and the active requests the caller pre-fetched
//! for duplicate detection. A [`GuardEvaluator`] runs its guards in declared
//! order and stops at the first failure.

mod calendar;
mod profile;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, Month};

pub use calendar::{Calendar, WorkCalendar};
pub use profile::{Priority, RequestProfile, RequestType};

use crate::config::EngineConfig;
use crate::definition::Action;
use crate::subject::{FoodType, InstitutionId, Subject, SubjectId};

/// Which guard failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    InThePast,
    InsufficientAdvanceNotice,
    WrongFiscalYear,
    DuplicateActiveRequest,
    NotASchoolDay,
    LateRequestMustBeQuestioned,
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuardKind::InThePast => "in_the_past",
            GuardKind::InsufficientAdvanceNotice => "insufficient_advance_notice",
            GuardKind::WrongFiscalYear => "wrong_fiscal_year",
            GuardKind::DuplicateActiveRequest => "duplicate_active_request",
            GuardKind::NotASchoolDay => "not_a_school_day",
            GuardKind::LateRequestMustBeQuestioned => "late_request_must_be_questioned",
        };
        f.write_str(s)
    }
}

/// A failed guard and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct GuardViolation {
    pub kind: GuardKind,
    pub message: String,
}

impl GuardViolation {
    pub fn new(kind: GuardKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A domain precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// No requested date may be before today.
    NotInPast,
    /// The earliest date must be at least `n` business days away. Request
    /// types marked notice-exempt pass unconditionally.
    MustRequestDaysInAdvance(u32),
    /// Dates must fall in the current fiscal year; in December the next
    /// year is open too.
    MustBeSameFiscalYear,
    /// No other open request of the same type for the same school may cover
    /// one of the dates with an overlapping food type.
    NoDuplicateActiveRequest,
    /// Every date must be a school day for the school. With
    /// `vacation_override`, dates in vacation months skip the check.
    MustBeASchoolDay { vacation_override: bool },
}

/// An open request that may collide with the one being checked.
///
/// Callers fetch these ahead of time (same school and request type, not in a
/// draft or terminal state, the subject itself excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRequest {
    pub subject_id: SubjectId,
    pub dates: Vec<Date>,
    pub food_types: Vec<FoodType>,
}

impl ActiveRequest {
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            subject_id: subject.id,
            dates: subject.active_dates(),
            food_types: subject.food_types(),
        }
    }
}

/// Everything a guard may read.
pub struct GuardContext<'a> {
    pub today: Date,
    pub calendar: &'a dyn Calendar,
    pub config: &'a EngineConfig,
    pub request_type: RequestType,
    pub school: &'a InstitutionId,
    pub dates: &'a [Date],
    pub food_types: &'a [FoodType],
    pub active_requests: &'a [ActiveRequest],
}

impl Guard {
    /// Run this guard against `ctx`.
    pub fn check(&self, ctx: &GuardContext<'_>) -> Result<(), GuardViolation> {
        match *self {
            Guard::NotInPast => {
                if let Some(date) = ctx.dates.iter().find(|d| **d < ctx.today) {
                    return Err(GuardViolation::new(
                        GuardKind::InThePast,
                        format!("{date} is in the past"),
                    ));
                }
            }
            Guard::MustRequestDaysInAdvance(days) => {
                if ctx.request_type.profile().notice_exempt {
                    return Ok(());
                }
                let earliest_allowed = ctx.calendar.add_business_days(ctx.today, days);
                if let Some(date) = ctx.dates.iter().min().filter(|d| **d < earliest_allowed) {
                    return Err(GuardViolation::new(
                        GuardKind::InsufficientAdvanceNotice,
                        format!("{date} must be requested at least {days} business days in advance"),
                    ));
                }
            }
            Guard::MustBeSameFiscalYear => {
                let current = ctx.calendar.fiscal_year(ctx.today);
                if ctx.today.month() == Month::December {
                    return Ok(());
                }
                if let Some(date) = ctx
                    .dates
                    .iter()
                    .find(|d| ctx.calendar.fiscal_year(**d) != current)
                {
                    return Err(GuardViolation::new(
                        GuardKind::WrongFiscalYear,
                        format!("{date} is outside fiscal year {current}"),
                    ));
                }
            }
            Guard::NoDuplicateActiveRequest => {
                if let Some((other, date)) = find_duplicate(ctx) {
                    return Err(GuardViolation::new(
                        GuardKind::DuplicateActiveRequest,
                        format!("request {other} already covers {date} for school {}", ctx.school),
                    ));
                }
            }
            Guard::MustBeASchoolDay { vacation_override } => {
                let not_school_day = ctx.dates.iter().find(|d| {
                    !(vacation_override && ctx.config.is_vacation(**d))
                        && !ctx.calendar.is_school_day(ctx.school, **d)
                });
                if let Some(date) = not_school_day {
                    return Err(GuardViolation::new(
                        GuardKind::NotASchoolDay,
                        format!("{date} is not a school day"),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn find_duplicate(ctx: &GuardContext<'_>) -> Option<(SubjectId, Date)> {
    ctx.active_requests.iter().find_map(|other| {
        let food_overlap = ctx.food_types.is_empty()
            || other.food_types.is_empty()
            || other.food_types.iter().any(|f| ctx.food_types.contains(f));
        if !food_overlap {
            return None;
        }
        other
            .dates
            .iter()
            .find(|d| ctx.dates.contains(d))
            .map(|d| (other.subject_id, *d))
    })
}

/// Ordered AND of guards: first failure wins, nothing is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardEvaluator {
    guards: Vec<Guard>,
}

impl GuardEvaluator {
    pub fn new(guards: Vec<Guard>) -> Self {
        Self { guards }
    }

    /// Creation guards of `request_type`.
    pub fn for_request(request_type: RequestType, config: &EngineConfig) -> Self {
        Self::new(request_type.profile().creation_guards(config))
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn evaluate(&self, ctx: &GuardContext<'_>) -> Result<(), GuardViolation> {
        self.guards.iter().try_for_each(|guard| guard.check(ctx))
    }
}

/// A request submitted late must have been questioned by CODAE, and the
/// vendor must have answered, before CODAE may authorize it. Partial
/// cancellations made after the answer leave it standing.
pub fn check_late_request(subject: &Subject) -> Result<(), GuardViolation> {
    if !subject.requested_late() || subject.request_type.profile().notice_exempt {
        return Ok(());
    }
    match subject.audit.last_state_change() {
        Some(entry) if entry.action == Action::VendorRespond => Ok(()),
        _ => Err(GuardViolation::new(
            GuardKind::LateRequestMustBeQuestioned,
            format!(
                "request {} was submitted late and must be questioned before authorization",
                subject.id
            ),
        )),
    }
}
