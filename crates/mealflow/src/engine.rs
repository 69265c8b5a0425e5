//! Workflow engine bundle.

use std::sync::Arc;

use crate::runtime::WorkflowRuntime;
use crate::service::WorkflowService;
use crate::store::{SubjectQueryStore, SubjectStore};

/// Convenience bundle for a service + runtime pair sharing one dispatcher.
///
/// Keep `service` for request handling and move `runtime` into a task that
/// calls [`WorkflowRuntime::run`].
pub struct WorkflowEngine<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    pub service: Arc<WorkflowService<S>>,
    pub runtime: WorkflowRuntime<S>,
}
