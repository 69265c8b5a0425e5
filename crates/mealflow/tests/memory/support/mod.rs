//! Shared fixtures for the in-memory integration tests.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use mealflow::notify::{
    DeliveryContext, DispatchError, Notification, NotificationDispatcher, NotificationHandler,
};
use mealflow::{
    Action, Actor, DomainPayload, EngineConfig, FixedClock, InstitutionTrail, MemoryStore,
    NewSubject, RequestType, Role, Subject, TransitionPayload, WorkCalendar, WorkflowService,
};
use time::macros::{date, datetime};
use time::{Date, OffsetDateTime};

pub const SCHOOL: &str = "school-1";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mealflow=debug")
        .with_test_writer()
        .try_init();
}

/// Wednesday 2024-05-01, noon in São Paulo.
pub fn now() -> OffsetDateTime {
    datetime!(2024-05-01 15:00 UTC)
}

/// Weekdays are school days; `SCHOOL` also holds classes on the weekend of
/// 11-12 May.
pub fn calendar() -> WorkCalendar {
    WorkCalendar::new()
        .with_extra_school_day(SCHOOL, date!(2024 - 05 - 11))
        .with_extra_school_day(SCHOOL, date!(2024 - 05 - 12))
}

pub fn may_dates() -> Vec<Date> {
    vec![
        date!(2024 - 05 - 10),
        date!(2024 - 05 - 11),
        date!(2024 - 05 - 12),
    ]
}

// =============================================================================
// Actors
// =============================================================================

pub fn school() -> Actor {
    Actor::new("school-user", Role::School)
}

pub fn dre() -> Actor {
    Actor::new("dre-user", Role::Dre)
}

pub fn codae() -> Actor {
    Actor::new("codae-user", Role::Codae)
}

pub fn vendor() -> Actor {
    Actor::new("vendor-user", Role::Vendor)
}

pub fn admin() -> Actor {
    Actor::new("admin-user", Role::Admin)
}

// =============================================================================
// Requests
// =============================================================================

pub fn trail() -> InstitutionTrail {
    InstitutionTrail {
        school: SCHOOL.into(),
        dre: "dre-1".into(),
        lot: Some("lot-1".into()),
        vendor: Some("vendor-1".into()),
    }
}

pub fn menu_change(dates: Vec<Date>) -> NewSubject {
    NewSubject {
        request_type: RequestType::MenuChange,
        trail: trail(),
        dates,
        payload: DomainPayload::MenuChange {
            reason: "field trip".into(),
            periods: vec!["morning".into()],
            replaced: vec!["lunch".into()],
            replacement: vec!["snack".into()],
        },
    }
}

pub fn measurement(year: i32, month: u8) -> NewSubject {
    NewSubject {
        request_type: RequestType::InitialMeasurement,
        trail: trail(),
        dates: Vec::new(),
        payload: DomainPayload::InitialMeasurement { year, month },
    }
}

// =============================================================================
// Recording collaborators
// =============================================================================

/// Dispatcher that keeps every notification it is handed.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(&self, notification: Notification) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Dispatcher whose queue is always full.
pub struct FullDispatcher;

impl NotificationDispatcher for FullDispatcher {
    fn notify(&self, _notification: Notification) -> Result<(), DispatchError> {
        Err(DispatchError::QueueFull)
    }
}

/// Handler that records deliveries, failing the first `fail_first` attempts.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    delivered: Arc<Mutex<Vec<(Notification, DeliveryContext)>>>,
    attempts: Arc<Mutex<u32>>,
    fail_first: u32,
}

impl RecordingHandler {
    pub fn failing(fail_first: u32) -> Self {
        Self {
            fail_first,
            ..Default::default()
        }
    }

    pub fn delivered(&self) -> Vec<(Notification, DeliveryContext)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl NotificationHandler for RecordingHandler {
    type Error = anyhow::Error;

    async fn handle(
        &self,
        notification: &Notification,
        ctx: &DeliveryContext,
    ) -> Result<(), Self::Error> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if attempt <= self.fail_first {
            return Err(anyhow!("mail server unavailable"));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((notification.clone(), ctx.clone()));
        Ok(())
    }
}

// =============================================================================
// Test app
// =============================================================================

pub struct TestApp {
    pub service: WorkflowService<MemoryStore>,
    pub store: MemoryStore,
    pub clock: FixedClock,
    pub notifications: RecordingDispatcher,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = MemoryStore::new();
        let clock = FixedClock::new(now());
        let notifications = RecordingDispatcher::default();
        let service = WorkflowService::builder(store.clone())
            .clock(clock.clone())
            .calendar(calendar())
            .config(config)
            .dispatcher(notifications.clone())
            .build_service()
            .expect("service should build");
        Self {
            service,
            store,
            clock,
            notifications,
        }
    }

    /// Create and submit a menu change, ending in `PendingDreValidation`.
    pub async fn submitted(&self, dates: Vec<Date>) -> Result<Subject> {
        let subject = self.service.create(menu_change(dates), &school()).await?;
        self.service
            .transition(subject.id, Action::Start, &school(), TransitionPayload::new())
            .await?;
        Ok(self.service.load(subject.id).await?)
    }

    /// A submitted menu change the DRE has validated.
    pub async fn dre_validated(&self, dates: Vec<Date>) -> Result<Subject> {
        let subject = self.submitted(dates).await?;
        self.service
            .transition(subject.id, Action::DreValidate, &dre(), TransitionPayload::new())
            .await?;
        Ok(self.service.load(subject.id).await?)
    }
}

/// Poll `check` until it yields a value or `timeout` passes.
pub async fn wait_until<F, Fut, T>(timeout: Duration, check: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(result) = check().await {
            return Ok(result);
        }

        if tokio::time::Instant::now() > deadline {
            return Err(anyhow!("timeout waiting for condition"));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
