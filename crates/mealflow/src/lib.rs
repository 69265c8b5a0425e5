//! Approval workflow engine for school meal requests.
//!
//! Mealflow moves menu changes, menu inversions, special-diet requests,
//! suspensions and monthly measurements through their approval chains:
//!
//! - **Declarative state machines**: one validated [`TransitionTable`] per
//!   [`WorkflowVariant`], keyed by `(state, action)` with the roles allowed
//!   to take each edge
//! - **Guards**: date and duplicate preconditions checked before any write
//! - **Append-only audit**: every state change produces exactly one
//!   [`AuditEntry`], saved atomically with the subject
//! - **Cancellation**: partial or full, respecting the notice window
//! - **Notifications**: fire-and-forget, delivered by the runtime with retries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        WorkflowService<S>                               │
//! │                                                                         │
//! │   1. Load subject (with its version)                                    │
//! │   2. Look up (state, action) edge, check actor role                     │
//! │   3. Evaluate guards against calendar, clock and active requests        │
//! │   4. Save subject + audit entry (optimistic version check)              │
//! │   5. Dispatch notification (best effort)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mealflow::{Action, Actor, MemoryStore, Role, TransitionPayload, WorkflowService};
//!
//! let service = WorkflowService::builder(MemoryStore::new()).build_service()?;
//!
//! let school = Actor::new("school-user-1", Role::School);
//! let subject = service.create(new_menu_change, &school).await?;
//! service
//!     .transition(subject.id, Action::Start, &school, TransitionPayload::new())
//!     .await?;
//! ```
//!
//! # Feature Flags
//!
//! - `postgres`: Enables [`PgStore`] for production use with PostgreSQL
//!
//! # Design Documentation
//!
//! See `DESIGN.md` for architectural decisions.

// Allow the crate to reference itself as `mealflow` for macro-generated code
extern crate self as mealflow;

mod actor;
mod audit;
mod cancellation;
mod clock;
mod command;
mod config;
mod definition;
mod engine;
mod error;
mod guard;
pub mod notify;
pub mod runtime;
mod service;
pub mod store;
mod subject;
mod sweep;

pub use actor::{Actor, ActorId, Role};
pub use audit::{AuditEntry, AuditTrail};
pub use cancellation::{CancellationCoordinator, CancellationOutcome, CancellationPlan};
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{Command, CommandOutcome};
pub use config::EngineConfig;
pub use definition::{
    Action, DefinitionRegistry, Edge, State, StateDefinition, TableBuilder, Transition,
    TransitionGuard, TransitionTable, WorkflowVariant,
};
pub use engine::WorkflowEngine;
pub use error::{Error, Result};
pub use guard::{
    ActiveRequest, Calendar, Guard, GuardContext, GuardEvaluator, GuardKind, GuardViolation,
    Priority, RequestProfile, RequestType, WorkCalendar, check_late_request,
};
pub use runtime::{RuntimeConfig, WorkflowBuilder, WorkflowRuntime};
pub use service::{TransitionPayload, WorkflowService};
#[cfg(feature = "postgres")]
pub use store::PgStore;
pub use store::{DuplicateScope, MemoryStore, SubjectQueryStore, SubjectStore};
pub use subject::{
    DateScopedItem, DomainPayload, FoodType, HasSubjectId, InstitutionId, InstitutionTrail,
    NewSubject, Subject, SubjectId,
};
pub use sweep::SweepReport;

// Re-export derive macros
pub use mealflow_macros::HasSubjectId;
