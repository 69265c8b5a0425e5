//! Partial and full cancellation through WorkflowService.

use mealflow::notify::{Audience, Notification};
use mealflow::{
    Action, CancellationOutcome, DomainPayload, EngineConfig, Error, MemoryStore, NewSubject,
    RequestType, State, TransitionPayload, WorkCalendar, WorkflowService,
};
use time::macros::date;

use crate::support::{SCHOOL, TestApp, dre, may_dates, menu_change, now, school, trail};

#[tokio::test]
async fn cancelling_some_dates_keeps_the_state() -> anyhow::Result<()> {
    let app = TestApp::new();
    let subject = app.dre_validated(may_dates()).await?;
    app.notifications.clear();

    let outcome = app
        .service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 10)], &school(), "trip moved")
        .await?;
    assert_eq!(
        outcome,
        CancellationOutcome::Partial {
            cancelled: vec![date!(2024 - 05 - 10)],
            remaining: vec![date!(2024 - 05 - 11), date!(2024 - 05 - 12)],
            state: State::DreValidated,
        }
    );

    let reloaded = app.service.load(subject.id).await?;
    assert_eq!(reloaded.current_state, State::DreValidated);
    let cancelled = reloaded.child(date!(2024 - 05 - 10)).unwrap();
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.cancelled_justification.as_deref(), Some("trip moved"));
    assert_eq!(cancelled.cancelled_at, Some(now()));
    assert_eq!(reloaded.active_dates().len(), 2);

    let sent = app.notifications.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notification::PartialCancellation {
            cancelled_dates,
            remaining_dates,
            audience,
            state,
            ..
        } => {
            assert_eq!(cancelled_dates, &vec![date!(2024 - 05 - 10)]);
            assert_eq!(remaining_dates.len(), 2);
            assert_eq!(audience, &vec![Audience::Vendor]);
            assert_eq!(*state, State::DreValidated);
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    let last = app.service.history(subject.id).await?.pop().unwrap();
    assert_eq!(last.action, Action::SchoolCancel);
    assert_eq!(last.from_state, State::DreValidated);
    assert_eq!(last.resulting_state, State::DreValidated);
    assert_eq!(last.cancelled_dates, vec![date!(2024 - 05 - 10)]);
    Ok(())
}

#[tokio::test]
async fn cancelling_the_last_dates_cancels_the_subject() -> anyhow::Result<()> {
    let app = TestApp::new();
    let subject = app.dre_validated(may_dates()).await?;
    app.service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 10)], &school(), "trip moved")
        .await?;
    app.notifications.clear();

    let outcome = app
        .service
        .partial_cancel(
            subject.id,
            &[date!(2024 - 05 - 11), date!(2024 - 05 - 12)],
            &school(),
            "trip cancelled",
        )
        .await?;
    assert_eq!(outcome.state(), State::Cancelled);
    assert!(matches!(outcome, CancellationOutcome::Full { .. }));

    let reloaded = app.service.load(subject.id).await?;
    assert_eq!(reloaded.current_state, State::Cancelled);
    assert!(reloaded.all_cancelled());
    assert_eq!(app.service.replay(subject.id).await?, State::Cancelled);

    let sent = app.notifications.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0],
        Notification::StateChanged {
            to: State::Cancelled,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn repeating_a_cancellation_changes_nothing() -> anyhow::Result<()> {
    let app = TestApp::new();
    let subject = app.dre_validated(may_dates()).await?;
    app.service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 10)], &school(), "trip moved")
        .await?;
    let history_len = app.service.history(subject.id).await?.len();
    let sent = app.notifications.sent().len();

    let outcome = app
        .service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 10)], &school(), "again")
        .await?;
    assert_eq!(
        outcome,
        CancellationOutcome::Unchanged {
            state: State::DreValidated
        }
    );
    assert_eq!(app.service.history(subject.id).await?.len(), history_len);
    assert_eq!(app.notifications.sent().len(), sent);

    let reloaded = app.service.load(subject.id).await?;
    let child = reloaded.child(date!(2024 - 05 - 10)).unwrap();
    assert_eq!(child.cancelled_justification.as_deref(), Some("trip moved"));
    Ok(())
}

#[tokio::test]
async fn dates_inside_the_notice_window_cannot_be_cancelled() -> anyhow::Result<()> {
    let app = TestApp::new();
    let subject = app.submitted(vec![date!(2024 - 05 - 03), date!(2024 - 05 - 10)]).await?;

    // Wednesday + 2 business days reaches Friday 3 May.
    let err = app
        .service
        .partial_cancel(
            subject.id,
            &[date!(2024 - 05 - 03), date!(2024 - 05 - 10)],
            &school(),
            "too late",
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::CancellationWindowClosed {
            date
        } if date == date!(2024 - 05 - 03)
    ));

    // Nothing was cancelled, not even the date that was still open.
    let reloaded = app.service.load(subject.id).await?;
    assert_eq!(reloaded.active_dates().len(), 2);
    assert_eq!(app.service.history(subject.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn suspension_days_widen_the_window() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let service = WorkflowService::builder(store)
        .clock(mealflow::FixedClock::new(now()))
        .calendar(WorkCalendar::new().with_suspension(SCHOOL, date!(2024 - 05 - 02)))
        .build_service()?;
    let subject = service
        .create(menu_change(vec![date!(2024 - 05 - 06)]), &school())
        .await?;
    service
        .transition(subject.id, Action::Start, &school(), TransitionPayload::new())
        .await?;

    // Without the suspension the window would end on Friday 3 May.
    let err = service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 06)], &school(), "sick")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CancellationWindowClosed { .. }));
    Ok(())
}

#[tokio::test]
async fn cancellation_window_follows_config() -> anyhow::Result<()> {
    let app = TestApp::with_config(EngineConfig {
        cancel_notice_business_days: 0,
        ..EngineConfig::default()
    });
    let subject = app.submitted(vec![date!(2024 - 05 - 03)]).await?;

    let outcome = app
        .service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 03)], &school(), "no notice")
        .await?;
    assert_eq!(outcome.state(), State::Cancelled);
    Ok(())
}

#[tokio::test]
async fn invalid_cancellation_requests() -> anyhow::Result<()> {
    let app = TestApp::new();
    let subject = app.submitted(may_dates()).await?;

    let err = app
        .service
        .partial_cancel(subject.id, &[], &school(), "nothing")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoDatesToCancel));

    let err = app
        .service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 20)], &school(), "wrong date")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DateNotInRequest { .. }));

    let err = app
        .service
        .partial_cancel(subject.id, &[date!(2024 - 05 - 10)], &dre(), "not mine")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnauthorizedActor {
            action: Action::SchoolCancel,
            ..
        }
    ));

    assert_eq!(app.service.history(subject.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn school_cancel_transition_cancels_every_date() -> anyhow::Result<()> {
    let app = TestApp::new();
    let subject = app.submitted(may_dates()).await?;
    app.notifications.clear();

    let state = app
        .service
        .transition(
            subject.id,
            Action::SchoolCancel,
            &school(),
            TransitionPayload::new().justification("no longer needed"),
        )
        .await?;
    assert_eq!(state, State::Cancelled);

    let reloaded = app.service.load(subject.id).await?;
    assert!(reloaded.all_cancelled());

    let sent = app.notifications.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notification::StateChanged {
            audience,
            justification,
            ..
        } => {
            // Still waiting on the DRE, so the DRE hears about it.
            assert_eq!(audience, &vec![Audience::Dre]);
            assert_eq!(justification.as_deref(), Some("no longer needed"));
        }
        other => panic!("unexpected notification: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn undated_diet_cancels_straight_away() -> anyhow::Result<()> {
    let app = TestApp::new();
    let diet = NewSubject {
        request_type: RequestType::SpecialDiet,
        trail: trail(),
        dates: Vec::new(),
        payload: DomainPayload::SpecialDiet {
            student_code: "1234567".into(),
            diagnoses: vec!["lactose intolerance".into()],
            valid_until: Some(date!(2024 - 12 - 20)),
        },
    };
    let subject = app.service.create(diet, &school()).await?;
    app.service
        .transition(subject.id, Action::Start, &school(), TransitionPayload::new())
        .await?;
    app.notifications.clear();

    let state = app
        .service
        .transition(subject.id, Action::SchoolCancel, &school(), TransitionPayload::new())
        .await?;
    assert_eq!(state, State::Cancelled);

    let sent = app.notifications.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].audience(), &[Audience::Codae]);

    let last = app.service.history(subject.id).await?.pop().unwrap();
    assert_eq!(last.from_state, State::PendingCodaeAuthorization);
    assert!(last.cancelled_dates.is_empty());
    Ok(())
}
