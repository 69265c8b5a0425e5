//! Service and runtime builder.

use std::sync::Arc;

use super::config::RuntimeConfig;
use super::notification_worker::DeadLetterQueue;
use super::WorkflowRuntime;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::definition::DefinitionRegistry;
use crate::engine::WorkflowEngine;
use crate::error::Result;
use crate::guard::{Calendar, WorkCalendar};
use crate::notify::handler::{ErasedHandler, NoopHandler};
use crate::notify::{
    NoopDispatcher, NotificationDispatcher, NotificationHandler, NotificationQueue,
    QueuedDispatcher,
};
use crate::service::WorkflowService;
use crate::store::{SubjectQueryStore, SubjectStore};

/// Builder for [`WorkflowService`], [`WorkflowRuntime`] and
/// [`WorkflowEngine`].
///
/// Every setting has a default: the standard transition tables, a
/// weekday-only [`WorkCalendar`], the system clock, [`EngineConfig::default`]
/// and [`RuntimeConfig::default`].
///
/// # Notifications
///
/// - With [`dispatcher`](Self::dispatcher), notifications go to that
///   dispatcher and the runtime starts no notification worker.
/// - Otherwise [`build_runtime`](Self::build_runtime) and
///   [`build_engine`](Self::build_engine) wire a [`QueuedDispatcher`] to a
///   worker calling the [`handler`](Self::handler).
/// - [`build_service`](Self::build_service) alone, with no dispatcher set,
///   drops notifications.
///
/// # Example
///
/// ```ignore
/// let engine = WorkflowRuntime::builder(store)
///     .calendar(school_calendar)
///     .handler(email_handler)
///     .runtime_config(RuntimeConfig {
///         sweep_interval: Duration::from_secs(15 * 60),
///         ..Default::default()
///     })
///     .build_engine()?;
/// ```
pub struct WorkflowBuilder<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    store: S,
    definitions: Option<DefinitionRegistry>,
    calendar: Arc<dyn Calendar>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    runtime_config: RuntimeConfig,
    handler: Option<Arc<dyn ErasedHandler>>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
}

impl<S> WorkflowBuilder<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    pub(crate) fn new(store: S) -> Self {
        Self {
            store,
            definitions: None,
            calendar: Arc::new(WorkCalendar::new()),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            runtime_config: RuntimeConfig::default(),
            handler: None,
            dispatcher: None,
        }
    }

    /// Use custom transition tables instead of
    /// [`DefinitionRegistry::standard`].
    pub fn definitions(mut self, definitions: DefinitionRegistry) -> Self {
        self.definitions = Some(definitions);
        self
    }

    pub fn calendar(mut self, calendar: impl Calendar + 'static) -> Self {
        self.calendar = Arc::new(calendar);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Transport the notification worker delivers through.
    ///
    /// If not called, deliveries are dropped with a warning.
    pub fn handler<H: NotificationHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Send notifications to `dispatcher` instead of the built-in queue.
    pub fn dispatcher(mut self, dispatcher: impl NotificationDispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Build the workflow service without starting workers.
    pub fn build_service(self) -> Result<WorkflowService<S>> {
        let definitions = Self::resolve_definitions(self.definitions)?;
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(NoopDispatcher));
        WorkflowService::new(
            self.store,
            definitions,
            self.calendar,
            self.clock,
            dispatcher,
            self.config,
        )
    }

    /// Build the runtime.
    pub fn build_runtime(self) -> Result<WorkflowRuntime<S>> {
        let (_service, runtime) = self.build_parts()?;
        Ok(runtime)
    }

    /// Build the workflow engine (service + runtime).
    pub fn build_engine(self) -> Result<WorkflowEngine<S>> {
        let (service, runtime) = self.build_parts()?;
        Ok(WorkflowEngine { service, runtime })
    }

    fn build_parts(self) -> Result<(Arc<WorkflowService<S>>, WorkflowRuntime<S>)> {
        let definitions = Self::resolve_definitions(self.definitions)?;
        let worker_id = self
            .runtime_config
            .worker_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let (dispatcher, queue): (Arc<dyn NotificationDispatcher>, Option<NotificationQueue>) =
            match self.dispatcher {
                Some(dispatcher) => (dispatcher, None),
                None => {
                    let (dispatcher, queue) =
                        QueuedDispatcher::channel(
                        self.runtime_config.notification_queue_capacity,
                        Arc::clone(&self.clock),
                    );
                    (Arc::new(dispatcher), Some(queue))
                }
            };

        let service = Arc::new(WorkflowService::new(
            self.store,
            definitions,
            self.calendar,
            self.clock,
            dispatcher,
            self.config,
        )?);
        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(NoopHandler));

        let runtime = WorkflowRuntime {
            service: Arc::clone(&service),
            queue,
            handler,
            config: self.runtime_config,
            worker_id,
            dead_letters: DeadLetterQueue::default(),
        };
        Ok((service, runtime))
    }

    fn resolve_definitions(definitions: Option<DefinitionRegistry>) -> Result<Arc<DefinitionRegistry>> {
        let definitions = match definitions {
            Some(definitions) => definitions,
            None => DefinitionRegistry::standard()?,
        };
        Ok(Arc::new(definitions))
    }
}

impl<S> WorkflowService<S>
where
    S: SubjectStore + SubjectQueryStore,
{
    /// Create a builder. Same as [`WorkflowRuntime::builder`].
    pub fn builder(store: S) -> WorkflowBuilder<S> {
        WorkflowBuilder::new(store)
    }
}
