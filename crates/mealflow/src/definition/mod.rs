//! State machine definitions, one immutable transition table per variant.
//!
//! Every request type maps onto one of four [`WorkflowVariant`]s. A variant
//! owns its declared state set and a transition table of
//! `(from states, action, allowed roles, to state, guard?)` edges. Tables are
//! validated once when built and never mutated afterwards, so the engine,
//! audit replay and diagram rendering all read the same source of truth.
//!
//! # Example
//!
//! ```
//! use mealflow::{Action, DefinitionRegistry, State, WorkflowVariant};
//!
//! let registry = DefinitionRegistry::standard().unwrap();
//! let table = registry.get(WorkflowVariant::ApprovalFromSchool).unwrap();
//!
//! let edge = table.lookup(State::PendingDreValidation, Action::DreReject).unwrap();
//! assert_eq!(edge.to, State::DreRejected);
//! assert!(table.is_terminal(State::DreRejected));
//! ```

mod diagram;
mod variants;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actor::Role;
use crate::error::{Error, Result};

/// The family of workflow a request follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowVariant {
    /// School → DRE → CODAE → vendor, with questioning and cancellation.
    ApprovalFromSchool,
    /// School informs, vendor acknowledges; no approval step.
    InformationalFromSchool,
    /// School → CODAE, plus the inactivation sub-flow.
    SpecialDietFromSchool,
    /// Monthly meal measurement with DRE and CODAE correction loops.
    InitialMeasurement,
}

impl WorkflowVariant {
    pub const ALL: [WorkflowVariant; 4] = [
        WorkflowVariant::ApprovalFromSchool,
        WorkflowVariant::InformationalFromSchool,
        WorkflowVariant::SpecialDietFromSchool,
        WorkflowVariant::InitialMeasurement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowVariant::ApprovalFromSchool => "approval_from_school",
            WorkflowVariant::InformationalFromSchool => "informational_from_school",
            WorkflowVariant::SpecialDietFromSchool => "special_diet_from_school",
            WorkflowVariant::InitialMeasurement => "initial_measurement",
        }
    }
}

impl fmt::Display for WorkflowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every state any variant may declare.
///
/// A subject's state is always one its own variant declares; the union lives
/// in one enum so audit entries and storage columns share a vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Draft,
    PendingDreValidation,
    DreRequestedRevision,
    DreValidated,
    DreRejected,
    CodaeAuthorized,
    CodaeDenied,
    CodaeQuestioning,
    VendorAcknowledged,
    Cancelled,
    AutoCancelled,
    Informed,
    PendingCodaeAuthorization,
    CancellationDenied,
    InactivationRequested,
    InactivationAuthorized,
    InactivationDenied,
    InactivationAcknowledged,
    Expired,
    CancelledStudentChangedSchool,
    CancelledStudentLeftNetwork,
    MeasurementSubmitted,
    DreCorrectionRequested,
    CorrectedForDre,
    DreApproved,
    CodaeCorrectionRequested,
    CorrectedForCodae,
    CodaeApproved,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Draft => "draft",
            State::PendingDreValidation => "pending_dre_validation",
            State::DreRequestedRevision => "dre_requested_revision",
            State::DreValidated => "dre_validated",
            State::DreRejected => "dre_rejected",
            State::CodaeAuthorized => "codae_authorized",
            State::CodaeDenied => "codae_denied",
            State::CodaeQuestioning => "codae_questioning",
            State::VendorAcknowledged => "vendor_acknowledged",
            State::Cancelled => "cancelled",
            State::AutoCancelled => "auto_cancelled",
            State::Informed => "informed",
            State::PendingCodaeAuthorization => "pending_codae_authorization",
            State::CancellationDenied => "cancellation_denied",
            State::InactivationRequested => "inactivation_requested",
            State::InactivationAuthorized => "inactivation_authorized",
            State::InactivationDenied => "inactivation_denied",
            State::InactivationAcknowledged => "inactivation_acknowledged",
            State::Expired => "expired",
            State::CancelledStudentChangedSchool => "cancelled_student_changed_school",
            State::CancelledStudentLeftNetwork => "cancelled_student_left_network",
            State::MeasurementSubmitted => "measurement_submitted",
            State::DreCorrectionRequested => "dre_correction_requested",
            State::CorrectedForDre => "corrected_for_dre",
            State::DreApproved => "dre_approved",
            State::CodaeCorrectionRequested => "codae_correction_requested",
            State::CorrectedForCodae => "corrected_for_codae",
            State::CodaeApproved => "codae_approved",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named actions that drive transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    DreValidate,
    DreReject,
    DreRequestRevision,
    SchoolRevise,
    CodaeAuthorize,
    CodaeDeny,
    CodaeQuestion,
    VendorRespond,
    VendorAcknowledge,
    SchoolCancel,
    SystemAutoCancel,
    Inform,
    CodaeDenyCancellation,
    RequestInactivation,
    CodaeAuthorizeInactivation,
    CodaeDenyInactivation,
    VendorAcknowledgeInactivation,
    SystemExpire,
    CancelStudentChangedSchool,
    CancelStudentLeftNetwork,
    SchoolSubmit,
    DreRequestCorrection,
    SchoolCorrect,
    DreApprove,
    CodaeRequestCorrection,
    SchoolCorrectForCodae,
    CodaeApprove,
    /// Recorded on audit entries written by an administrative override.
    /// Never appears in a transition table.
    AdminOverride,
}

impl Action {
    pub const ALL: [Action; 29] = [
        Action::Start,
        Action::DreValidate,
        Action::DreReject,
        Action::DreRequestRevision,
        Action::SchoolRevise,
        Action::CodaeAuthorize,
        Action::CodaeDeny,
        Action::CodaeQuestion,
        Action::VendorRespond,
        Action::VendorAcknowledge,
        Action::SchoolCancel,
        Action::SystemAutoCancel,
        Action::Inform,
        Action::CodaeDenyCancellation,
        Action::RequestInactivation,
        Action::CodaeAuthorizeInactivation,
        Action::CodaeDenyInactivation,
        Action::VendorAcknowledgeInactivation,
        Action::SystemExpire,
        Action::CancelStudentChangedSchool,
        Action::CancelStudentLeftNetwork,
        Action::SchoolSubmit,
        Action::DreRequestCorrection,
        Action::SchoolCorrect,
        Action::DreApprove,
        Action::CodaeRequestCorrection,
        Action::SchoolCorrectForCodae,
        Action::CodaeApprove,
        Action::AdminOverride,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::DreValidate => "dre_validate",
            Action::DreReject => "dre_reject",
            Action::DreRequestRevision => "dre_request_revision",
            Action::SchoolRevise => "school_revise",
            Action::CodaeAuthorize => "codae_authorize",
            Action::CodaeDeny => "codae_deny",
            Action::CodaeQuestion => "codae_question",
            Action::VendorRespond => "vendor_respond",
            Action::VendorAcknowledge => "vendor_acknowledge",
            Action::SchoolCancel => "school_cancel",
            Action::SystemAutoCancel => "system_auto_cancel",
            Action::Inform => "inform",
            Action::CodaeDenyCancellation => "codae_deny_cancellation",
            Action::RequestInactivation => "request_inactivation",
            Action::CodaeAuthorizeInactivation => "codae_authorize_inactivation",
            Action::CodaeDenyInactivation => "codae_deny_inactivation",
            Action::VendorAcknowledgeInactivation => "vendor_acknowledge_inactivation",
            Action::SystemExpire => "system_expire",
            Action::CancelStudentChangedSchool => "cancel_student_changed_school",
            Action::CancelStudentLeftNetwork => "cancel_student_left_network",
            Action::SchoolSubmit => "school_submit",
            Action::DreRequestCorrection => "dre_request_correction",
            Action::SchoolCorrect => "school_correct",
            Action::DreApprove => "dre_approve",
            Action::CodaeRequestCorrection => "codae_request_correction",
            Action::SchoolCorrectForCodae => "school_correct_for_codae",
            Action::CodaeApprove => "codae_approve",
            Action::AdminOverride => "admin_override",
        }
    }

    /// Cancels the whole request (and routes through cancellation logic).
    pub fn is_school_cancel(&self) -> bool {
        matches!(self, Action::SchoolCancel)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precondition attached to an edge, evaluated by the guard module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionGuard {
    /// Re-run the request type's creation guards (dates, duplicates).
    CreationRules,
    /// A late request must go through CODAE questioning before authorization.
    LateRequestQuestioned,
}

/// A declared state and whether it ends the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDefinition {
    pub state: State,
    pub terminal: bool,
}

/// One resolved edge of a transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Vec<State>,
    pub action: Action,
    pub allowed_roles: Vec<Role>,
    pub to: State,
    pub guard: Option<TransitionGuard>,
}

impl Transition {
    /// Returns `true` if `role` may take this edge.
    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// Edge declaration used while building a table.
///
/// Source states are either listed explicitly or resolved to every
/// non-terminal state of the table at build time.
#[derive(Debug, Clone)]
pub struct Edge {
    from: Option<Vec<State>>,
    action: Action,
    roles: Vec<Role>,
    to: State,
    guard: Option<TransitionGuard>,
}

impl Edge {
    pub fn new(action: Action, to: State) -> Self {
        Self {
            from: Some(Vec::new()),
            action,
            roles: Vec::new(),
            to,
            guard: None,
        }
    }

    pub fn from(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.from = Some(states.into_iter().collect());
        self
    }

    pub fn from_any_non_terminal(mut self) -> Self {
        self.from = None;
        self
    }

    pub fn by(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn guarded(mut self, guard: TransitionGuard) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// Builder for a validated [`TransitionTable`].
pub struct TableBuilder {
    variant: WorkflowVariant,
    initial: Option<State>,
    states: Vec<StateDefinition>,
    edges: Vec<Edge>,
}

impl TableBuilder {
    /// Declare a non-terminal state.
    pub fn state(mut self, state: State) -> Self {
        self.states.push(StateDefinition {
            state,
            terminal: false,
        });
        self
    }

    /// Declare a terminal state.
    pub fn terminal(mut self, state: State) -> Self {
        self.states.push(StateDefinition {
            state,
            terminal: true,
        });
        self
    }

    pub fn initial(mut self, state: State) -> Self {
        self.initial = Some(state);
        self
    }

    pub fn edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Resolve and validate the table.
    ///
    /// Rejects duplicate or undeclared states, a missing or terminal initial
    /// state, edges without roles, edges leaving a terminal state and two
    /// edges sharing a `(state, action)` pair.
    pub fn build(self) -> Result<TransitionTable> {
        let variant = self.variant;
        let mut declared = HashMap::new();
        for def in &self.states {
            if declared.insert(def.state, def.terminal).is_some() {
                return Err(Error::invalid_definition(
                    variant,
                    format!("state {} declared twice", def.state),
                ));
            }
        }

        let initial = self
            .initial
            .ok_or_else(|| Error::invalid_definition(variant, "no initial state"))?;
        match declared.get(&initial) {
            Some(false) => {}
            Some(true) => {
                return Err(Error::invalid_definition(
                    variant,
                    format!("initial state {initial} is terminal"),
                ));
            }
            None => {
                return Err(Error::invalid_definition(
                    variant,
                    format!("initial state {initial} is not declared"),
                ));
            }
        }

        let non_terminal: Vec<State> = self
            .states
            .iter()
            .filter(|d| !d.terminal)
            .map(|d| d.state)
            .collect();

        let mut seen = HashSet::new();
        let mut transitions = Vec::with_capacity(self.edges.len());
        for edge in self.edges {
            let from = edge.from.unwrap_or_else(|| non_terminal.clone());
            if from.is_empty() {
                return Err(Error::invalid_definition(
                    variant,
                    format!("{} has no source state", edge.action),
                ));
            }
            if edge.roles.is_empty() {
                return Err(Error::invalid_definition(
                    variant,
                    format!("{} allows no role", edge.action),
                ));
            }
            if !declared.contains_key(&edge.to) {
                return Err(Error::invalid_definition(
                    variant,
                    format!("{} targets undeclared state {}", edge.action, edge.to),
                ));
            }
            for state in &from {
                match declared.get(state) {
                    None => {
                        return Err(Error::invalid_definition(
                            variant,
                            format!("{} leaves undeclared state {state}", edge.action),
                        ));
                    }
                    Some(true) => {
                        return Err(Error::invalid_definition(
                            variant,
                            format!("{} leaves terminal state {state}", edge.action),
                        ));
                    }
                    Some(false) => {}
                }
                if !seen.insert((*state, edge.action)) {
                    return Err(Error::invalid_definition(
                        variant,
                        format!("{} declared twice from {state}", edge.action),
                    ));
                }
            }
            transitions.push(Transition {
                from,
                action: edge.action,
                allowed_roles: edge.roles,
                to: edge.to,
                guard: edge.guard,
            });
        }

        Ok(TransitionTable {
            variant,
            initial,
            states: self.states,
            transitions,
        })
    }
}

/// Immutable transition table for one variant.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    variant: WorkflowVariant,
    initial: State,
    states: Vec<StateDefinition>,
    transitions: Vec<Transition>,
}

impl TransitionTable {
    pub fn builder(variant: WorkflowVariant) -> TableBuilder {
        TableBuilder {
            variant,
            initial: None,
            states: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn variant(&self) -> WorkflowVariant {
        self.variant
    }

    pub fn initial_state(&self) -> State {
        self.initial
    }

    pub fn states(&self) -> &[StateDefinition] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Returns `true` if the variant declares `state`.
    pub fn declares(&self, state: State) -> bool {
        self.states.iter().any(|d| d.state == state)
    }

    pub fn is_terminal(&self, state: State) -> bool {
        self.states
            .iter()
            .any(|d| d.state == state && d.terminal)
    }

    /// Find the edge for `action` out of `state`.
    pub fn lookup(&self, state: State, action: Action) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.action == action && t.from.contains(&state))
    }

    /// Like [`lookup`](Self::lookup), failing with [`Error::InvalidTransition`].
    pub fn require(&self, state: State, action: Action) -> Result<&Transition> {
        self.lookup(state, action)
            .ok_or(Error::InvalidTransition { state, action })
    }

    /// Every edge that may be taken out of `state`.
    pub fn available_from(&self, state: State) -> impl Iterator<Item = &Transition> {
        self.transitions
            .iter()
            .filter(move |t| t.from.contains(&state))
    }
}

/// Registry of transition tables keyed by variant.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    tables: HashMap<WorkflowVariant, TransitionTable>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in table of every variant.
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new();
        for variant in WorkflowVariant::ALL {
            registry.register(variant)?;
        }
        Ok(registry)
    }

    /// Build and register the built-in table for `variant`.
    pub fn register(&mut self, variant: WorkflowVariant) -> Result<&TransitionTable> {
        let table = variants::table_for(variant)?;
        self.register_table(table)
    }

    /// Register a custom table. Each variant can only be registered once.
    pub fn register_table(&mut self, table: TransitionTable) -> Result<&TransitionTable> {
        let variant = table.variant();
        if self.tables.contains_key(&variant) {
            return Err(Error::DuplicateVariant(variant));
        }
        Ok(self.tables.entry(variant).or_insert(table))
    }

    pub fn get(&self, variant: WorkflowVariant) -> Result<&TransitionTable> {
        self.tables
            .get(&variant)
            .ok_or(Error::UnknownVariant(variant))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
