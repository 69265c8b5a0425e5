//! Built-in transition tables.

use super::{Action, Edge, State, TransitionGuard, TransitionTable, WorkflowVariant};
use crate::actor::Role;
use crate::error::Result;

pub(super) fn table_for(variant: WorkflowVariant) -> Result<TransitionTable> {
    match variant {
        WorkflowVariant::ApprovalFromSchool => approval_from_school(),
        WorkflowVariant::InformationalFromSchool => informational_from_school(),
        WorkflowVariant::SpecialDietFromSchool => special_diet_from_school(),
        WorkflowVariant::InitialMeasurement => initial_measurement(),
    }
}

/// Menu changes, inversions, inclusions and tour kits.
///
/// The questioning sub-cycle returns to `DreValidated` whatever the vendor
/// answered; the answer itself is kept on the audit entry.
fn approval_from_school() -> Result<TransitionTable> {
    use State::*;

    TransitionTable::builder(WorkflowVariant::ApprovalFromSchool)
        .initial(Draft)
        .state(Draft)
        .state(PendingDreValidation)
        .state(DreRequestedRevision)
        .state(DreValidated)
        .state(CodaeQuestioning)
        .state(CodaeAuthorized)
        .state(VendorAcknowledged)
        .terminal(DreRejected)
        .terminal(CodaeDenied)
        .terminal(Cancelled)
        .terminal(AutoCancelled)
        .edge(
            Edge::new(Action::Start, PendingDreValidation)
                .from([Draft])
                .by([Role::School])
                .guarded(TransitionGuard::CreationRules),
        )
        .edge(
            Edge::new(Action::DreValidate, DreValidated)
                .from([PendingDreValidation])
                .by([Role::Dre]),
        )
        .edge(
            Edge::new(Action::DreReject, DreRejected)
                .from([PendingDreValidation])
                .by([Role::Dre]),
        )
        .edge(
            Edge::new(Action::DreRequestRevision, DreRequestedRevision)
                .from([PendingDreValidation])
                .by([Role::Dre]),
        )
        .edge(
            Edge::new(Action::SchoolRevise, PendingDreValidation)
                .from([DreRequestedRevision])
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::CodaeAuthorize, CodaeAuthorized)
                .from([DreValidated])
                .by([Role::Codae])
                .guarded(TransitionGuard::LateRequestQuestioned),
        )
        .edge(
            Edge::new(Action::CodaeDeny, CodaeDenied)
                .from([DreValidated, CodaeQuestioning])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::CodaeQuestion, CodaeQuestioning)
                .from([DreValidated])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::VendorRespond, DreValidated)
                .from([CodaeQuestioning])
                .by([Role::Vendor]),
        )
        .edge(
            Edge::new(Action::VendorAcknowledge, VendorAcknowledged)
                .from([CodaeAuthorized])
                .by([Role::Vendor]),
        )
        .edge(
            Edge::new(Action::SchoolCancel, Cancelled)
                .from_any_non_terminal()
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::SystemAutoCancel, AutoCancelled)
                .from_any_non_terminal()
                .by([Role::System]),
        )
        .build()
}

/// Food suspensions: the school informs, nobody approves.
fn informational_from_school() -> Result<TransitionTable> {
    use State::*;

    TransitionTable::builder(WorkflowVariant::InformationalFromSchool)
        .initial(Draft)
        .state(Draft)
        .state(Informed)
        .state(VendorAcknowledged)
        .terminal(Cancelled)
        .edge(
            Edge::new(Action::Inform, Informed)
                .from([Draft])
                .by([Role::School])
                .guarded(TransitionGuard::CreationRules),
        )
        .edge(
            Edge::new(Action::VendorAcknowledge, VendorAcknowledged)
                .from([Informed])
                .by([Role::Vendor]),
        )
        .edge(
            Edge::new(Action::SchoolCancel, Cancelled)
                .from([Informed, VendorAcknowledged])
                .by([Role::School]),
        )
        .build()
}

fn special_diet_from_school() -> Result<TransitionTable> {
    use State::*;

    TransitionTable::builder(WorkflowVariant::SpecialDietFromSchool)
        .initial(Draft)
        .state(Draft)
        .state(PendingCodaeAuthorization)
        .state(CodaeAuthorized)
        .state(VendorAcknowledged)
        .state(InactivationRequested)
        .state(InactivationAuthorized)
        .terminal(CodaeDenied)
        .terminal(Cancelled)
        .terminal(CancellationDenied)
        .terminal(InactivationDenied)
        .terminal(InactivationAcknowledged)
        .terminal(Expired)
        .terminal(CancelledStudentChangedSchool)
        .terminal(CancelledStudentLeftNetwork)
        .edge(
            Edge::new(Action::Start, PendingCodaeAuthorization)
                .from([Draft])
                .by([Role::School])
                .guarded(TransitionGuard::CreationRules),
        )
        .edge(
            Edge::new(Action::CodaeDeny, CodaeDenied)
                .from([PendingCodaeAuthorization])
                .by([Role::Codae]),
        )
        // CODAE may register an already-approved diet directly from a draft.
        .edge(
            Edge::new(Action::CodaeAuthorize, CodaeAuthorized)
                .from([Draft, PendingCodaeAuthorization])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::VendorAcknowledge, VendorAcknowledged)
                .from([CodaeAuthorized])
                .by([Role::Vendor]),
        )
        .edge(
            Edge::new(Action::SchoolCancel, Cancelled)
                .from([PendingCodaeAuthorization, InactivationRequested, CodaeAuthorized])
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::CodaeDenyCancellation, CancellationDenied)
                .from([PendingCodaeAuthorization, InactivationRequested])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::RequestInactivation, InactivationRequested)
                .from([Draft, CodaeAuthorized, VendorAcknowledged])
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::CodaeDenyInactivation, InactivationDenied)
                .from([InactivationRequested])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::CodaeAuthorizeInactivation, InactivationAuthorized)
                .from([InactivationRequested])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::VendorAcknowledgeInactivation, InactivationAcknowledged)
                .from([InactivationAuthorized])
                .by([Role::Vendor]),
        )
        .edge(
            Edge::new(Action::SystemExpire, Expired)
                .from([CodaeAuthorized, VendorAcknowledged])
                .by([Role::System]),
        )
        .edge(
            Edge::new(Action::CancelStudentChangedSchool, CancelledStudentChangedSchool)
                .from([CodaeAuthorized])
                .by([Role::System, Role::Codae]),
        )
        .edge(
            Edge::new(Action::CancelStudentLeftNetwork, CancelledStudentLeftNetwork)
                .from([CodaeAuthorized])
                .by([Role::System, Role::Codae]),
        )
        .build()
}

/// Monthly measurement. `Draft` means open for the school to fill in; the
/// table has no terminal state because CODAE may reopen an approved period.
fn initial_measurement() -> Result<TransitionTable> {
    use State::*;

    TransitionTable::builder(WorkflowVariant::InitialMeasurement)
        .initial(Draft)
        .state(Draft)
        .state(MeasurementSubmitted)
        .state(DreCorrectionRequested)
        .state(CorrectedForDre)
        .state(DreApproved)
        .state(CodaeCorrectionRequested)
        .state(CorrectedForCodae)
        .state(CodaeApproved)
        .edge(
            Edge::new(Action::Start, Draft)
                .from([Draft])
                .by([Role::School, Role::System]),
        )
        .edge(
            Edge::new(Action::SchoolSubmit, MeasurementSubmitted)
                .from([Draft])
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::DreRequestCorrection, DreCorrectionRequested)
                .from([
                    DreCorrectionRequested,
                    MeasurementSubmitted,
                    DreApproved,
                    CorrectedForDre,
                ])
                .by([Role::Dre]),
        )
        .edge(
            Edge::new(Action::SchoolCorrect, CorrectedForDre)
                .from([DreCorrectionRequested, CorrectedForDre])
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::DreApprove, DreApproved)
                .from([MeasurementSubmitted, DreCorrectionRequested, CorrectedForDre])
                .by([Role::Dre]),
        )
        .edge(
            Edge::new(Action::CodaeRequestCorrection, CodaeCorrectionRequested)
                .from([
                    CodaeCorrectionRequested,
                    CodaeApproved,
                    DreApproved,
                    CorrectedForCodae,
                ])
                .by([Role::Codae]),
        )
        .edge(
            Edge::new(Action::SchoolCorrectForCodae, CorrectedForCodae)
                .from([CodaeCorrectionRequested, CorrectedForCodae])
                .by([Role::School]),
        )
        .edge(
            Edge::new(Action::CodaeApprove, CodaeApproved)
                .from([CodaeCorrectionRequested, DreApproved, CorrectedForCodae])
                .by([Role::Codae]),
        )
        .build()
}
