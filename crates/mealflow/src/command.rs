//! Serializable commands routed to the service.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::actor::Actor;
use crate::cancellation::CancellationOutcome;
use crate::definition::{Action, State};
use crate::subject::SubjectId;
use crate::HasSubjectId;

/// One mutating operation on one subject.
///
/// Lets callers queue or log operations as data and run them later with
/// [`WorkflowService::execute`](crate::WorkflowService::execute).
///
/// # Example
///
/// ```
/// use mealflow::{Action, Actor, Command, HasSubjectId, Role, SubjectId};
///
/// let id = SubjectId::new();
/// let command: Command = serde_json::from_value(serde_json::json!({
///     "type": "transition",
///     "subject_id": id,
///     "action": "dre_validate",
///     "actor": { "id": "dre-user", "role": "dre" },
/// }))
/// .unwrap();
///
/// assert_eq!(command.subject_id(), id);
/// assert_eq!(command.name(), "transition");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, HasSubjectId)]
#[serde(tag = "type", rename_all = "snake_case")]
#[subject_id(subject_id)]
pub enum Command {
    Transition {
        subject_id: SubjectId,
        action: Action,
        actor: Actor,
        #[serde(default)]
        justification: Option<String>,
        #[serde(default)]
        vendor_answer: Option<bool>,
    },
    PartialCancel {
        subject_id: SubjectId,
        dates: Vec<Date>,
        actor: Actor,
        justification: String,
    },
    AdminOverride {
        subject_id: SubjectId,
        target: State,
        actor: Actor,
        justification: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Transition { .. } => "transition",
            Command::PartialCancel { .. } => "partial_cancel",
            Command::AdminOverride { .. } => "admin_override",
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            Command::Transition { actor, .. }
            | Command::PartialCancel { actor, .. }
            | Command::AdminOverride { actor, .. } => actor,
        }
    }
}

/// Result of [`WorkflowService::execute`](crate::WorkflowService::execute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Transitioned(State),
    Cancelled(CancellationOutcome),
    Overridden(State),
}

impl CommandOutcome {
    /// State of the subject after the command.
    pub fn state(&self) -> State {
        match self {
            CommandOutcome::Transitioned(state) | CommandOutcome::Overridden(state) => *state,
            CommandOutcome::Cancelled(outcome) => outcome.state(),
        }
    }
}
