//! Workflow service entrypoint.
//!
//! [`WorkflowService`] is the single place subjects change. Every mutating
//! operation follows the same path: load the subject, check the edge and the
//! actor's role, run guards, build the next version of the subject plus its
//! audit entry, and hand both to [`SubjectStore::save`] as one unit. Only
//! after the save commits is a notification handed to the dispatcher, and a
//! failed hand-off is logged rather than returned.

use std::sync::Arc;

use time::{Date, UtcOffset};
use tracing::{debug, info, warn};

use crate::actor::{Actor, Role};
use crate::audit::AuditEntry;
use crate::cancellation::{CancellationCoordinator, CancellationOutcome};
use crate::clock::Clock;
use crate::command::{Command, CommandOutcome};
use crate::config::EngineConfig;
use crate::definition::{
    Action, DefinitionRegistry, State, TransitionGuard, TransitionTable, WorkflowVariant,
};
use crate::error::{Error, Result};
use crate::guard::{
    ActiveRequest, Calendar, GuardContext, GuardEvaluator, Priority, RequestType,
    check_late_request,
};
use crate::notify::{Notification, NotificationDispatcher, audience_for, counterpart};
use crate::store::{DuplicateScope, SubjectQueryStore, SubjectStore};
use crate::subject::{FoodType, InstitutionId, NewSubject, Subject, SubjectId};
use crate::HasSubjectId;

/// Optional data carried by a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPayload {
    pub justification: Option<String>,
    /// The vendor's yes/no answer to a CODAE question.
    pub vendor_answer: Option<bool>,
}

impl TransitionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn vendor_answer(mut self, answer: bool) -> Self {
        self.vendor_answer = Some(answer);
        self
    }
}

/// App-facing workflow service.
///
/// Build one with [`WorkflowService::builder`] (service only) or
/// [`WorkflowRuntime::builder`](crate::WorkflowRuntime::builder) (service
/// plus background workers).
pub struct WorkflowService<S> {
    store: S,
    definitions: Arc<DefinitionRegistry>,
    calendar: Arc<dyn Calendar>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: EngineConfig,
    offset: UtcOffset,
}

impl<S: Clone> Clone for WorkflowService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            definitions: Arc::clone(&self.definitions),
            calendar: Arc::clone(&self.calendar),
            clock: Arc::clone(&self.clock),
            dispatcher: Arc::clone(&self.dispatcher),
            config: self.config.clone(),
            offset: self.offset,
        }
    }
}

impl<S> WorkflowService<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    pub(crate) fn new(
        store: S,
        definitions: Arc<DefinitionRegistry>,
        calendar: Arc<dyn Calendar>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let offset = config.utc_offset()?;
        Ok(Self {
            store,
            definitions,
            calendar,
            clock,
            dispatcher,
            config,
            offset,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Transition table of `variant`.
    pub fn definition(&self, variant: WorkflowVariant) -> Result<&TransitionTable> {
        self.definitions.get(variant)
    }

    /// Today's date in the configured offset.
    pub fn today(&self) -> Date {
        self.clock.now().to_offset(self.offset).date()
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Open a new request in its variant's initial state.
    ///
    /// The actor's role must be allowed on some edge out of the initial state.
    /// The request type's creation guards run before anything is stored.
    /// Creation writes no audit entry; the trail starts with the first
    /// transition.
    pub async fn create(&self, new: NewSubject, actor: &Actor) -> Result<Subject> {
        let table = self.definitions.get(new.request_type.variant())?;
        let initial = table.initial_state();

        if !table.available_from(initial).any(|t| t.allows(actor.role)) {
            let action = table
                .available_from(initial)
                .find(|t| t.guard == Some(TransitionGuard::CreationRules))
                .map_or(Action::Start, |t| t.action);
            debug!(role = %actor.role, request_type = %new.request_type, "Creation rejected");
            return Err(Error::UnauthorizedActor {
                role: actor.role,
                action,
            });
        }

        self.check_creation_rules(
            new.request_type,
            &new.trail.school,
            &new.dates,
            &new.payload.food_types(),
            None,
        )
        .await
        .inspect_err(|e| {
            debug!(request_type = %new.request_type, error = %e, "Creation rejected");
        })?;

        let subject = Subject::open(
            SubjectId::new(),
            new,
            initial,
            actor.clone(),
            self.clock.now(),
        );
        self.store.insert(&subject).await?;

        info!(
            subject_id = %subject.id,
            request_type = %subject.request_type,
            actor = %actor.id,
            "Subject created"
        );
        Ok(subject)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Apply `action` to a subject and return its new state.
    ///
    /// `school_cancel` cancels every remaining date through the cancellation
    /// coordinator, so the window rules apply to it as they do to
    /// [`partial_cancel`](Self::partial_cancel).
    pub async fn transition(
        &self,
        id: SubjectId,
        action: Action,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> Result<State> {
        let result = async {
            let subject = self.store.load(id).await?;
            if action.is_school_cancel() {
                let justification = payload.justification.unwrap_or_default();
                return self
                    .cancel(subject, None, actor, &justification)
                    .await
                    .map(|outcome| outcome.state());
            }
            self.apply_transition(subject, action, actor, payload).await
        }
        .await;

        if let Err(e) = &result {
            debug!(subject_id = %id, action = %action, role = %actor.role, error = %e, "Transition rejected");
        }
        result
    }

    async fn apply_transition(
        &self,
        subject: Subject,
        action: Action,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> Result<State> {
        let table = self.definitions.get(subject.variant)?;
        let edge = table.require(subject.current_state, action)?;
        if !edge.allows(actor.role) {
            return Err(Error::UnauthorizedActor {
                role: actor.role,
                action,
            });
        }

        let mut next = subject.clone();
        match edge.guard {
            Some(TransitionGuard::CreationRules) => {
                let dates = subject.active_dates();
                self.check_creation_rules(
                    subject.request_type,
                    &subject.trail.school,
                    &dates,
                    &subject.food_types(),
                    Some(subject.id),
                )
                .await?;
                next.priority = dates.first().map(|first| {
                    Priority::classify(self.today(), *first, self.calendar.as_ref(), &self.config)
                });
            }
            Some(TransitionGuard::LateRequestQuestioned) => check_late_request(&subject)?,
            None => {}
        }

        next.current_state = edge.to;
        next.version += 1;
        let entry = self.audit_entry(&subject, actor, action, edge.to, &payload, Vec::new());
        self.store.save(&next, subject.version, &entry).await?;

        info!(
            subject_id = %subject.id,
            action = %action,
            from = %subject.current_state,
            to = %next.current_state,
            actor = %actor.id,
            "Transition applied"
        );
        self.dispatch(Notification::StateChanged {
            subject_id: subject.id,
            variant: subject.variant,
            request_type: subject.request_type,
            action,
            from: subject.current_state,
            to: next.current_state,
            actor: actor.clone(),
            trail: subject.trail.clone(),
            audience: audience_for(subject.variant, action, subject.current_state),
            justification: payload.justification,
        });
        Ok(next.current_state)
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancel some of a subject's dates.
    ///
    /// Cancelling the last active dates moves the subject to its cancelled
    /// state. Otherwise the state is unchanged and the counterpart
    /// institution gets one partial-cancellation notification. Dates that
    /// were already cancelled are skipped; if nothing is left to cancel the
    /// call writes nothing and notifies no one.
    pub async fn partial_cancel(
        &self,
        id: SubjectId,
        dates: &[Date],
        actor: &Actor,
        justification: &str,
    ) -> Result<CancellationOutcome> {
        let result = async {
            let subject = self.store.load(id).await?;
            self.cancel(subject, Some(dates), actor, justification).await
        }
        .await;

        if let Err(e) = &result {
            debug!(subject_id = %id, role = %actor.role, error = %e, "Cancellation rejected");
        }
        result
    }

    async fn cancel(
        &self,
        subject: Subject,
        dates: Option<&[Date]>,
        actor: &Actor,
        justification: &str,
    ) -> Result<CancellationOutcome> {
        let table = self.definitions.get(subject.variant)?;
        let coordinator = CancellationCoordinator::new(table, self.calendar.as_ref(), &self.config);
        let today = self.today();
        let plan = match dates {
            Some(dates) => coordinator.plan(&subject, dates, actor, today)?,
            None => coordinator.plan_all(&subject, actor, today)?,
        };

        if plan.is_noop() && !plan.is_full() {
            debug!(subject_id = %subject.id, "Dates already cancelled; nothing to do");
            return Ok(CancellationOutcome::Unchanged {
                state: subject.current_state,
            });
        }

        let mut next = subject.clone();
        let outcome = plan.apply(&mut next, justification, self.clock.now());
        next.version += 1;
        let payload = TransitionPayload::new().justification(justification);
        let entry = self.audit_entry(
            &subject,
            actor,
            Action::SchoolCancel,
            next.current_state,
            &payload,
            outcome.cancelled().to_vec(),
        );
        self.store.save(&next, subject.version, &entry).await?;

        match &outcome {
            CancellationOutcome::Full { cancelled, state } => {
                info!(
                    subject_id = %subject.id,
                    dates = cancelled.len(),
                    from = %subject.current_state,
                    to = %state,
                    "Subject cancelled"
                );
                self.dispatch(Notification::StateChanged {
                    subject_id: subject.id,
                    variant: subject.variant,
                    request_type: subject.request_type,
                    action: Action::SchoolCancel,
                    from: subject.current_state,
                    to: *state,
                    actor: actor.clone(),
                    trail: subject.trail.clone(),
                    audience: audience_for(
                        subject.variant,
                        Action::SchoolCancel,
                        subject.current_state,
                    ),
                    justification: payload.justification,
                });
            }
            CancellationOutcome::Partial {
                cancelled,
                remaining,
                state,
            } => {
                info!(
                    subject_id = %subject.id,
                    cancelled = cancelled.len(),
                    remaining = remaining.len(),
                    "Dates cancelled"
                );
                self.dispatch(Notification::PartialCancellation {
                    subject_id: subject.id,
                    request_type: subject.request_type,
                    state: *state,
                    actor: actor.clone(),
                    trail: subject.trail.clone(),
                    cancelled_dates: cancelled.clone(),
                    remaining_dates: remaining.clone(),
                    audience: vec![counterpart(subject.variant, *state)],
                    justification: justification.to_string(),
                });
            }
            CancellationOutcome::Unchanged { .. } => {}
        }
        Ok(outcome)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Force a subject into `target`, bypassing the transition table.
    ///
    /// Requires the [`Role::Admin`] role, a non-empty justification and a
    /// target the variant declares. The override is written to the audit
    /// trail like any other transition.
    pub async fn admin_override(
        &self,
        id: SubjectId,
        target: State,
        actor: &Actor,
        justification: &str,
    ) -> Result<State> {
        if actor.role != Role::Admin {
            return Err(Error::UnauthorizedActor {
                role: actor.role,
                action: Action::AdminOverride,
            });
        }
        if justification.trim().is_empty() {
            return Err(Error::InvalidOverride(
                "a justification is required".to_string(),
            ));
        }

        let subject = self.store.load(id).await?;
        let table = self.definitions.get(subject.variant)?;
        if !table.declares(target) {
            return Err(Error::InvalidOverride(format!(
                "{target} is not a state of {}",
                subject.variant
            )));
        }
        if subject.current_state == target {
            return Err(Error::InvalidOverride(format!(
                "subject {id} is already in {target}"
            )));
        }

        let mut next = subject.clone();
        next.current_state = target;
        next.version += 1;
        let payload = TransitionPayload::new().justification(justification);
        let entry = self.audit_entry(
            &subject,
            actor,
            Action::AdminOverride,
            target,
            &payload,
            Vec::new(),
        );
        self.store.save(&next, subject.version, &entry).await?;

        warn!(
            subject_id = %id,
            from = %subject.current_state,
            to = %target,
            actor = %actor.id,
            "Admin override applied"
        );
        self.dispatch(Notification::StateChanged {
            subject_id: id,
            variant: subject.variant,
            request_type: subject.request_type,
            action: Action::AdminOverride,
            from: subject.current_state,
            to: target,
            actor: actor.clone(),
            trail: subject.trail.clone(),
            audience: audience_for(subject.variant, Action::AdminOverride, subject.current_state),
            justification: payload.justification,
        });
        Ok(target)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Load a subject with its audit trail.
    pub async fn load(&self, id: SubjectId) -> Result<Subject> {
        self.store.load(id).await
    }

    /// Audit entries of a subject, oldest first.
    pub async fn history(&self, id: SubjectId) -> Result<Vec<AuditEntry>> {
        self.store.fetch_audit(id).await
    }

    /// Rebuild a subject's state from its audit trail alone.
    ///
    /// Fails with [`Error::AuditWriteFailure`] if the trail has a gap or
    /// does not chain.
    pub async fn replay(&self, id: SubjectId) -> Result<State> {
        let subject = self.store.load(id).await?;
        let table = self.definitions.get(subject.variant)?;
        subject.audit.replay(table.initial_state())
    }

    /// Run a command against the subject it targets.
    pub async fn execute(&self, command: &Command) -> Result<CommandOutcome> {
        debug!(subject_id = %command.subject_id(), command = command.name(), "Executing command");
        match command {
            Command::Transition {
                subject_id,
                action,
                actor,
                justification,
                vendor_answer,
            } => {
                let payload = TransitionPayload {
                    justification: justification.clone(),
                    vendor_answer: *vendor_answer,
                };
                self.transition(*subject_id, *action, actor, payload)
                    .await
                    .map(CommandOutcome::Transitioned)
            }
            Command::PartialCancel {
                subject_id,
                dates,
                actor,
                justification,
            } => self
                .partial_cancel(*subject_id, dates, actor, justification)
                .await
                .map(CommandOutcome::Cancelled),
            Command::AdminOverride {
                subject_id,
                target,
                actor,
                justification,
            } => self
                .admin_override(*subject_id, *target, actor, justification)
                .await
                .map(CommandOutcome::Overridden),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn check_creation_rules(
        &self,
        request_type: RequestType,
        school: &InstitutionId,
        dates: &[Date],
        food_types: &[FoodType],
        exclude: Option<SubjectId>,
    ) -> Result<()> {
        let evaluator = GuardEvaluator::for_request(request_type, &self.config);
        if evaluator.guards().is_empty() {
            return Ok(());
        }

        let active = self
            .active_requests(request_type, school, dates, exclude)
            .await?;
        let ctx = GuardContext {
            today: self.today(),
            calendar: self.calendar.as_ref(),
            config: &self.config,
            request_type,
            school,
            dates,
            food_types,
            active_requests: &active,
        };
        evaluator.evaluate(&ctx)?;
        Ok(())
    }

    /// Other open requests that could collide with `dates`.
    ///
    /// Drafts and subjects in a terminal state are not considered open.
    async fn active_requests(
        &self,
        request_type: RequestType,
        school: &InstitutionId,
        dates: &[Date],
        exclude: Option<SubjectId>,
    ) -> Result<Vec<ActiveRequest>> {
        let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
            return Ok(Vec::new());
        };
        let table = self.definitions.get(request_type.variant())?;
        let scope = DuplicateScope {
            school: school.clone(),
            request_type,
            first: *first,
            last: *last,
            exclude,
        };

        let candidates = self.store.find_overlapping(&scope).await?;
        Ok(candidates
            .iter()
            .filter(|s| s.current_state != State::Draft && !table.is_terminal(s.current_state))
            .map(ActiveRequest::from_subject)
            .collect())
    }

    fn audit_entry(
        &self,
        subject: &Subject,
        actor: &Actor,
        action: Action,
        resulting_state: State,
        payload: &TransitionPayload,
        cancelled_dates: Vec<Date>,
    ) -> AuditEntry {
        AuditEntry {
            subject_id: subject.id,
            sequence: subject.audit.next_sequence(),
            actor: actor.clone(),
            action,
            justification: payload.justification.clone(),
            vendor_answer: payload.vendor_answer,
            cancelled_dates,
            timestamp: self.clock.now(),
            from_state: subject.current_state,
            resulting_state,
        }
    }

    /// Hand a notification to the dispatcher. Failures are logged only.
    fn dispatch(&self, notification: Notification) {
        let subject_id = notification.subject_id();
        let kind = notification.kind();
        if let Err(e) = self.dispatcher.notify(notification) {
            warn!(subject_id = %subject_id, kind, error = %e, "Notification dispatch failed");
        }
    }
}
