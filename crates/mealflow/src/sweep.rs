//! Background sweeps over many subjects.
//!
//! Each sweep drives subjects one at a time through the ordinary service
//! operations. A failure on one subject is logged and counted, and the sweep
//! moves on to the next.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::actor::Actor;
use crate::definition::{Action, State, WorkflowVariant};
use crate::error::{Error, Result};
use crate::guard::RequestType;
use crate::service::{TransitionPayload, WorkflowService};
use crate::store::{SubjectQueryStore, SubjectStore};
use crate::subject::{DomainPayload, InstitutionId, InstitutionTrail, NewSubject};

/// States in which a request is still waiting for someone to decide.
const AWAITING_DECISION: [State; 4] = [
    State::PendingDreValidation,
    State::DreRequestedRevision,
    State::DreValidated,
    State::CodaeQuestioning,
];

/// Per-sweep counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SweepReport {
    fn record<T>(&mut self, result: &Result<T>) {
        self.processed += 1;
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }
}

impl<S> WorkflowService<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    /// Auto-cancel approval requests nobody decided on before their last
    /// date passed.
    pub async fn auto_cancel_elapsed(&self) -> Result<SweepReport> {
        let today = self.today();
        let candidates = self
            .store()
            .list_elapsed(WorkflowVariant::ApprovalFromSchool, &AWAITING_DECISION, today)
            .await?;

        let system = Actor::system();
        let mut report = SweepReport::default();
        for subject in candidates {
            let payload = TransitionPayload::new()
                .justification(format!("no decision before {}", today));
            let result = self
                .transition(subject.id, Action::SystemAutoCancel, &system, payload)
                .await;
            if let Err(e) = &result {
                warn!(subject_id = %subject.id, error = %e, "Auto-cancel failed, continuing");
            }
            report.record(&result);
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Auto-cancel sweep finished"
        );
        Ok(report)
    }

    /// Open the `year`/`month` measurement for every school that had one the
    /// month before and does not have one yet.
    pub async fn roll_over_measurements(&self, year: i32, month: u8) -> Result<SweepReport> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidPeriod { year, month });
        }
        let previous = if month == 1 {
            (year - 1, 12)
        } else {
            (year, month - 1)
        };

        let existing = self
            .store()
            .list_by_request_type(RequestType::InitialMeasurement)
            .await?;

        let mut to_open: BTreeMap<InstitutionId, InstitutionTrail> = BTreeMap::new();
        let mut already_open = Vec::new();
        for subject in existing {
            let DomainPayload::InitialMeasurement {
                year: y,
                month: m,
            } = subject.payload
            else {
                continue;
            };
            if (y, m) == previous {
                to_open.insert(subject.trail.school.clone(), subject.trail);
            } else if (y, m) == (year, month) {
                already_open.push(subject.trail.school);
            }
        }
        to_open.retain(|school, _| !already_open.contains(school));

        let system = Actor::system();
        let mut report = SweepReport::default();
        for (school, trail) in to_open {
            let result = self.open_measurement(trail, year, month, &system).await;
            if let Err(e) = &result {
                warn!(school = %school, year, month, error = %e, "Measurement rollover failed, continuing");
            }
            report.record(&result);
        }

        info!(
            year,
            month,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Measurement rollover finished"
        );
        Ok(report)
    }

    async fn open_measurement(
        &self,
        trail: InstitutionTrail,
        year: i32,
        month: u8,
        actor: &Actor,
    ) -> Result<State> {
        let subject = self
            .create(
                NewSubject {
                    request_type: RequestType::InitialMeasurement,
                    trail,
                    dates: Vec::new(),
                    payload: DomainPayload::InitialMeasurement { year, month },
                },
                actor,
            )
            .await?;
        self.transition(subject.id, Action::Start, actor, TransitionPayload::new())
            .await
    }
}
