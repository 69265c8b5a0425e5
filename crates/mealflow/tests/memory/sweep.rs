//! Background sweeps: auto-cancel and measurement rollover.

use mealflow::{
    Action, DomainPayload, Error, InstitutionTrail, RequestType, Role, State, SubjectQueryStore,
    SweepReport,
};
use time::Duration;
use time::macros::{date, datetime};

use crate::support::{TestApp, measurement, menu_change, school, trail};

#[tokio::test]
async fn undecided_requests_are_auto_cancelled_after_their_last_date() -> anyhow::Result<()> {
    let app = TestApp::new();
    let elapsed = app.dre_validated(vec![date!(2024 - 05 - 10)]).await?;
    let upcoming = app.submitted(vec![date!(2024 - 05 - 20)]).await?;
    let draft = app
        .service
        .create(menu_change(vec![date!(2024 - 05 - 09)]), &school())
        .await?;

    // Nothing has elapsed yet.
    let report = app.service.auto_cancel_elapsed().await?;
    assert_eq!(report, SweepReport::default());

    app.clock.set(datetime!(2024-05-13 15:00 UTC));
    let report = app.service.auto_cancel_elapsed().await?;
    assert_eq!(
        report,
        SweepReport {
            processed: 1,
            succeeded: 1,
            failed: 0,
        }
    );

    assert_eq!(
        app.service.load(elapsed.id).await?.current_state,
        State::AutoCancelled
    );
    assert_eq!(
        app.service.load(upcoming.id).await?.current_state,
        State::PendingDreValidation
    );
    assert_eq!(app.service.load(draft.id).await?.current_state, State::Draft);

    let last = app.service.history(elapsed.id).await?.pop().unwrap();
    assert_eq!(last.action, Action::SystemAutoCancel);
    assert_eq!(last.actor.role, Role::System);

    // A second sweep finds nothing left to do.
    let report = app.service.auto_cancel_elapsed().await?;
    assert_eq!(report.processed, 0);
    Ok(())
}

#[tokio::test]
async fn sweep_continues_past_failures() -> anyhow::Result<()> {
    let app = TestApp::new();
    let first = app.dre_validated(vec![date!(2024 - 05 - 09)]).await?;
    app.clock.advance(Duration::minutes(5));
    let second = app.dre_validated(vec![date!(2024 - 05 - 10)]).await?;

    app.clock.set(datetime!(2024-05-13 15:00 UTC));
    app.store.fail_next_audit_write();
    let report = app.service.auto_cancel_elapsed().await?;
    assert_eq!(
        report,
        SweepReport {
            processed: 2,
            succeeded: 1,
            failed: 1,
        }
    );

    // Candidates are visited oldest first, so the first one hit the failure.
    assert_eq!(
        app.service.load(first.id).await?.current_state,
        State::DreValidated
    );
    assert_eq!(
        app.service.load(second.id).await?.current_state,
        State::AutoCancelled
    );
    Ok(())
}

#[tokio::test]
async fn measurements_roll_over_to_the_next_month() -> anyhow::Result<()> {
    let app = TestApp::new();
    let other_school = InstitutionTrail {
        school: "school-2".into(),
        ..trail()
    };

    app.service.create(measurement(2024, 4), &school()).await?;
    let mut april = measurement(2024, 4);
    april.trail = other_school.clone();
    app.service.create(april, &school()).await?;
    let mut may = measurement(2024, 5);
    may.trail = other_school;
    app.service.create(may, &school()).await?;

    let report = app.service.roll_over_measurements(2024, 5).await?;
    assert_eq!(
        report,
        SweepReport {
            processed: 1,
            succeeded: 1,
            failed: 0,
        }
    );

    let opened: Vec<_> = app
        .store
        .list_by_request_type(RequestType::InitialMeasurement)
        .await?
        .into_iter()
        .filter(|s| {
            s.trail.school.as_str() == "school-1"
                && s.payload == DomainPayload::InitialMeasurement { year: 2024, month: 5 }
        })
        .collect();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].current_state, State::Draft);
    assert_eq!(opened[0].created_by.role, Role::System);

    let history = app.service.history(opened[0].id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, Action::Start);

    // Running again opens nothing new.
    let report = app.service.roll_over_measurements(2024, 5).await?;
    assert_eq!(report.processed, 0);
    Ok(())
}

#[tokio::test]
async fn january_rolls_over_from_december() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.service.create(measurement(2024, 12), &school()).await?;

    let report = app.service.roll_over_measurements(2025, 1).await?;
    assert_eq!(report.succeeded, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_period_is_rejected() {
    let app = TestApp::new();
    let err = app.service.roll_over_measurements(2024, 13).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidPeriod {
            year: 2024,
            month: 13
        }
    ));
}
