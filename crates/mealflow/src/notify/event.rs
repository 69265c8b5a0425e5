//! Notification events and who receives them.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::actor::Actor;
use crate::definition::{Action, State, WorkflowVariant};
use crate::guard::RequestType;
use crate::subject::{InstitutionTrail, SubjectId};
use crate::HasSubjectId;

/// Institution kind a notification is addressed to.
///
/// Concrete addresses are resolved by the handler from the subject's
/// [`InstitutionTrail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    School,
    Dre,
    Codae,
    Vendor,
}

/// Event emitted after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, HasSubjectId)]
#[serde(tag = "event", rename_all = "snake_case")]
#[subject_id(subject_id)]
pub enum Notification {
    StateChanged {
        subject_id: SubjectId,
        variant: WorkflowVariant,
        request_type: RequestType,
        action: Action,
        from: State,
        to: State,
        actor: Actor,
        trail: InstitutionTrail,
        audience: Vec<Audience>,
        justification: Option<String>,
    },
    /// Fewer dates will be served; the subject's state did not change.
    PartialCancellation {
        subject_id: SubjectId,
        request_type: RequestType,
        state: State,
        actor: Actor,
        trail: InstitutionTrail,
        cancelled_dates: Vec<Date>,
        remaining_dates: Vec<Date>,
        audience: Vec<Audience>,
        justification: String,
    },
}

impl Notification {
    pub fn audience(&self) -> &[Audience] {
        match self {
            Notification::StateChanged { audience, .. }
            | Notification::PartialCancellation { audience, .. } => audience,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::StateChanged { .. } => "state_changed",
            Notification::PartialCancellation { .. } => "partial_cancellation",
        }
    }
}

/// Institution that must learn about a school cancellation made while the
/// subject is in `state`.
///
/// Requests still waiting on the DRE (or on CODAE, for special diets) notify
/// that reviewer; anything past review notifies the vendor.
pub fn counterpart(variant: WorkflowVariant, state: State) -> Audience {
    match (variant, state) {
        (
            WorkflowVariant::ApprovalFromSchool,
            State::Draft | State::PendingDreValidation | State::DreRequestedRevision,
        ) => Audience::Dre,
        (WorkflowVariant::SpecialDietFromSchool, State::PendingCodaeAuthorization) => {
            Audience::Codae
        }
        _ => Audience::Vendor,
    }
}

/// Recipients of the notification for `action` taken from state `from`.
pub fn audience_for(variant: WorkflowVariant, action: Action, from: State) -> Vec<Audience> {
    use Audience::*;

    match action {
        Action::Start => match variant {
            WorkflowVariant::ApprovalFromSchool => vec![Dre],
            WorkflowVariant::SpecialDietFromSchool => vec![Codae],
            WorkflowVariant::InformationalFromSchool | WorkflowVariant::InitialMeasurement => {
                Vec::new()
            }
        },
        Action::Inform => vec![Dre, Vendor],
        Action::SchoolRevise | Action::SchoolSubmit | Action::SchoolCorrect => vec![Dre],
        Action::DreValidate | Action::DreApprove => vec![Codae],
        Action::DreReject | Action::DreRequestRevision | Action::DreRequestCorrection => {
            vec![School]
        }
        Action::CodaeAuthorize => vec![School, Vendor],
        Action::CodaeDeny | Action::CodaeRequestCorrection | Action::CodaeApprove => {
            vec![School, Dre]
        }
        Action::CodaeQuestion => vec![Vendor],
        Action::VendorRespond
        | Action::VendorAcknowledge
        | Action::VendorAcknowledgeInactivation
        | Action::RequestInactivation
        | Action::SchoolCorrectForCodae => vec![Codae],
        Action::CodaeDenyCancellation => vec![School],
        Action::CodaeAuthorizeInactivation
        | Action::CodaeDenyInactivation
        | Action::SystemExpire
        | Action::CancelStudentChangedSchool
        | Action::CancelStudentLeftNetwork => vec![School, Vendor],
        Action::SchoolCancel => vec![counterpart(variant, from)],
        Action::SystemAutoCancel => vec![School, Dre],
        Action::AdminOverride => vec![School, Dre, Codae],
    }
}
