pub mod db;

use mealflow::{
    Action, Actor, DomainPayload, FixedClock, InstitutionTrail, NewSubject, PgStore, RequestType,
    Role, Subject, TransitionPayload, WorkCalendar, WorkflowService,
};
use sqlx::PgPool;
use time::Date;
use time::macros::{date, datetime};

pub const SCHOOL: &str = "school-1";

pub fn school() -> Actor {
    Actor::new("school-user", Role::School)
}

pub fn dre() -> Actor {
    Actor::new("dre-user", Role::Dre)
}

pub fn trail() -> InstitutionTrail {
    InstitutionTrail {
        school: SCHOOL.into(),
        dre: "dre-1".into(),
        lot: None,
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

pub fn may_dates() -> Vec<Date> {
    vec![
        date!(2024 - 05 - 10),
        date!(2024 - 05 - 13),
        date!(2024 - 05 - 14),
    ]
}

/// Service over a fresh `PgStore`, pinned to Wednesday 2024-05-01.
pub fn build_service(pool: &PgPool) -> (WorkflowService<PgStore>, FixedClock) {
    let clock = FixedClock::new(datetime!(2024-05-01 15:00 UTC));
    let service = WorkflowService::builder(PgStore::new(pool.clone()))
        .clock(clock.clone())
        .calendar(WorkCalendar::new())
        .build_service()
        .expect("service should build");
    (service, clock)
}

/// Create and submit a menu change.
pub async fn submitted(
    service: &WorkflowService<PgStore>,
    dates: Vec<Date>,
) -> mealflow::Result<Subject> {
    let subject = service.create(menu_change(dates), &school()).await?;
    service
        .transition(subject.id, Action::Start, &school(), TransitionPayload::new())
        .await?;
    service.load(subject.id).await
}
