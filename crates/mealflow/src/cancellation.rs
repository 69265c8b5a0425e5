//! Date-scoped cancellation: cancel some dates, or cancel everything.
//!
//! [`CancellationCoordinator::plan`] validates a request against the variant's
//! `school_cancel` edge and the cancellation window, then decides between a
//! partial cancellation (state unchanged, counterpart notified) and a full one
//! (every date cancelled, subject moved to the edge's target state).
//! [`CancellationPlan::apply`] performs the decision on a working copy of the
//! subject; persisting it is the caller's job.

use time::{Date, OffsetDateTime};

use crate::actor::Actor;
use crate::config::EngineConfig;
use crate::definition::{Action, State, TransitionTable};
use crate::error::{Error, Result};
use crate::guard::Calendar;
use crate::subject::Subject;

/// What a cancellation did to the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// Every named date was already cancelled; nothing was written.
    Unchanged { state: State },
    /// Some dates were cancelled, others remain active.
    Partial {
        cancelled: Vec<Date>,
        remaining: Vec<Date>,
        state: State,
    },
    /// The last active dates were cancelled and the subject moved to `state`.
    Full { cancelled: Vec<Date>, state: State },
}

impl CancellationOutcome {
    /// State of the subject after the cancellation.
    pub fn state(&self) -> State {
        match self {
            CancellationOutcome::Unchanged { state }
            | CancellationOutcome::Partial { state, .. }
            | CancellationOutcome::Full { state, .. } => *state,
        }
    }

    /// Dates newly cancelled by this operation.
    pub fn cancelled(&self) -> &[Date] {
        match self {
            CancellationOutcome::Unchanged { .. } => &[],
            CancellationOutcome::Partial { cancelled, .. }
            | CancellationOutcome::Full { cancelled, .. } => cancelled,
        }
    }
}

/// A validated cancellation, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationPlan {
    /// Dates to cancel now, sorted and without repeats.
    pub to_cancel: Vec<Date>,
    /// Active dates left after applying.
    pub remaining: Vec<Date>,
    /// State the subject moves to on a full cancellation.
    pub cancelled_state: State,
}

impl CancellationPlan {
    pub fn is_noop(&self) -> bool {
        self.to_cancel.is_empty()
    }

    /// Whether applying leaves no active date.
    pub fn is_full(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Mark the dates cancelled on `subject` and, when none remain, move it to
    /// the cancelled state.
    pub fn apply(
        &self,
        subject: &mut Subject,
        justification: &str,
        at: OffsetDateTime,
    ) -> CancellationOutcome {
        if self.is_noop() && !self.is_full() {
            return CancellationOutcome::Unchanged {
                state: subject.current_state,
            };
        }

        let cancelled = subject.cancel_dates(&self.to_cancel, justification, at);
        if subject.all_cancelled() {
            subject.current_state = self.cancelled_state;
            CancellationOutcome::Full {
                cancelled,
                state: subject.current_state,
            }
        } else {
            CancellationOutcome::Partial {
                cancelled,
                remaining: subject.active_dates(),
                state: subject.current_state,
            }
        }
    }
}

/// Decides how a cancellation request resolves.
pub struct CancellationCoordinator<'a> {
    table: &'a TransitionTable,
    calendar: &'a dyn Calendar,
    config: &'a EngineConfig,
}

impl<'a> CancellationCoordinator<'a> {
    pub fn new(
        table: &'a TransitionTable,
        calendar: &'a dyn Calendar,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            table,
            calendar,
            config,
        }
    }

    /// Validate cancelling `dates` of `subject` on `today`.
    ///
    /// Fails when no date is given, when the variant has no `school_cancel`
    /// edge from the current state, when the actor's role may not take it,
    /// when a date does not belong to the subject, or when a date still
    /// active is inside the cancellation window. Dates already cancelled
    /// are skipped before the window check.
    pub fn plan(
        &self,
        subject: &Subject,
        dates: &[Date],
        actor: &Actor,
        today: Date,
    ) -> Result<CancellationPlan> {
        if dates.is_empty() {
            return Err(Error::NoDatesToCancel);
        }
        let cancelled_state = self.authorize(subject, actor)?;

        let mut to_cancel = Vec::new();
        for &date in dates {
            let child = subject.child(date).ok_or(Error::DateNotInRequest {
                subject_id: subject.id,
                date,
            })?;
            if child.cancelled || to_cancel.contains(&date) {
                continue;
            }
            self.check_window(subject, date, today)?;
            to_cancel.push(date);
        }
        to_cancel.sort();

        let remaining = subject
            .active_dates()
            .into_iter()
            .filter(|d| !to_cancel.contains(d))
            .collect();

        Ok(CancellationPlan {
            to_cancel,
            remaining,
            cancelled_state,
        })
    }

    /// Plan cancelling every date still active.
    ///
    /// Undated subjects (special diets) yield an empty plan that still moves
    /// the subject to the cancelled state.
    pub fn plan_all(&self, subject: &Subject, actor: &Actor, today: Date) -> Result<CancellationPlan> {
        let active = subject.active_dates();
        if active.is_empty() {
            return Ok(CancellationPlan {
                to_cancel: Vec::new(),
                remaining: Vec::new(),
                cancelled_state: self.authorize(subject, actor)?,
            });
        }
        self.plan(subject, &active, actor, today)
    }

    fn authorize(&self, subject: &Subject, actor: &Actor) -> Result<State> {
        let edge = self
            .table
            .require(subject.current_state, Action::SchoolCancel)?;
        if !edge.allows(actor.role) {
            return Err(Error::UnauthorizedActor {
                role: actor.role,
                action: Action::SchoolCancel,
            });
        }
        Ok(edge.to)
    }

    fn check_window(&self, subject: &Subject, date: Date, today: Date) -> Result<()> {
        if subject.request_type.profile().notice_exempt {
            return Ok(());
        }
        let notice = self.config.cancel_notice_business_days;
        let suspended = self
            .calendar
            .suspension_days(&subject.trail.school, today, notice);
        let earliest_cancellable = self.calendar.add_business_days(today, notice + suspended);
        if earliest_cancellable >= date {
            return Err(Error::CancellationWindowClosed { date });
        }
        Ok(())
    }
}
