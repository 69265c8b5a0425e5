//! PgStore persistence, versioning and the append-only audit table.

use mealflow::{
    Action, AuditEntry, DuplicateScope, Error, PgStore, RequestType, State, Subject, SubjectId,
    SubjectQueryStore, SubjectStore, WorkflowVariant,
};
use time::macros::{date, datetime};

use crate::db_test;
use crate::support::{SCHOOL, may_dates, menu_change, school};

fn draft(dates: Vec<time::Date>) -> Subject {
    Subject::open(
        SubjectId::new(),
        menu_change(dates),
        State::Draft,
        school(),
        datetime!(2024-05-01 15:00 UTC),
    )
}

fn entry(subject: &Subject, action: Action, to: State) -> AuditEntry {
    AuditEntry {
        subject_id: subject.id,
        sequence: subject.audit.next_sequence(),
        actor: school(),
        action,
        justification: None,
        vendor_answer: None,
        cancelled_dates: Vec::new(),
        timestamp: datetime!(2024-05-01 15:00 UTC),
        from_state: subject.current_state,
        resulting_state: to,
    }
}

db_test!(insert_and_load_round_trip, |pool| {
    let store = PgStore::new(pool.clone());
    let subject = draft(may_dates());
    store.insert(&subject).await?;

    let loaded = store.load(subject.id).await?;
    assert_eq!(loaded.id, subject.id);
    assert_eq!(loaded.current_state, State::Draft);
    assert_eq!(loaded.version, 0);
    assert_eq!(loaded.dates(), may_dates());
    assert_eq!(loaded.payload, subject.payload);
    assert!(loaded.audit.is_empty());

    let err = store.insert(&subject).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateSubject(_)));

    let err = store.load(SubjectId::new()).await.unwrap_err();
    assert!(matches!(err, Error::SubjectNotFound(_)));
    Ok(())
});

db_test!(save_checks_the_version, |pool| {
    let store = PgStore::new(pool.clone());
    let subject = draft(may_dates());
    store.insert(&subject).await?;

    let mut next = subject.clone();
    next.current_state = State::PendingDreValidation;
    next.version = 1;
    let first = entry(&subject, Action::Start, State::PendingDreValidation);
    store.save(&next, 0, &first).await?;

    // A second writer still holding version 0 loses.
    let mut stale = subject.clone();
    stale.current_state = State::Cancelled;
    stale.version = 1;
    let err = store
        .save(&stale, 0, &entry(&subject, Action::SchoolCancel, State::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ConcurrentModification {
            expected_version: 0,
            ..
        }
    ));

    let loaded = store.load(subject.id).await?;
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.current_state, State::PendingDreValidation);
    assert_eq!(loaded.audit.len(), 1);
    assert_eq!(loaded.audit.all()[0], first);

    let missing = draft(may_dates());
    let err = store
        .save(&missing, 0, &entry(&missing, Action::Start, State::PendingDreValidation))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SubjectNotFound(_)));
    Ok(())
});

db_test!(failed_audit_insert_rolls_back_the_update, |pool| {
    let store = PgStore::new(pool.clone());
    let subject = draft(may_dates());
    store.insert(&subject).await?;

    let mut next = subject.clone();
    next.current_state = State::PendingDreValidation;
    next.version = 1;
    let first = entry(&subject, Action::Start, State::PendingDreValidation);
    store.save(&next, 0, &first).await?;

    // Reusing sequence 1 violates the primary key.
    let mut again = next.clone();
    again.current_state = State::DreValidated;
    again.version = 2;
    let err = store.save(&again, 1, &first).await.unwrap_err();
    assert!(matches!(err, Error::AuditWriteFailure(_)));

    let loaded = store.load(subject.id).await?;
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.current_state, State::PendingDreValidation);
    Ok(())
});

db_test!(audit_rows_cannot_be_changed, |pool| {
    let store = PgStore::new(pool.clone());
    let subject = draft(may_dates());
    store.insert(&subject).await?;
    let mut next = subject.clone();
    next.current_state = State::PendingDreValidation;
    next.version = 1;
    store
        .save(&next, 0, &entry(&subject, Action::Start, State::PendingDreValidation))
        .await?;

    let update = sqlx::query("UPDATE mealflow.audit_entries SET action = 'dre_validate'")
        .execute(pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM mealflow.audit_entries")
        .execute(pool)
        .await;
    assert!(delete.is_err());

    assert_eq!(store.fetch_audit(subject.id).await?.len(), 1);
    Ok(())
});

db_test!(queries_filter_by_scope, |pool| {
    let store = PgStore::new(pool.clone());

    let mut pending = draft(vec![date!(2024 - 05 - 10)]);
    pending.current_state = State::PendingDreValidation;
    store.insert(&pending).await?;
    let later = draft(vec![date!(2024 - 05 - 20), date!(2024 - 05 - 21)]);
    store.insert(&later).await?;

    let scope = DuplicateScope {
        school: SCHOOL.into(),
        request_type: RequestType::MenuChange,
        first: date!(2024 - 05 - 09),
        last: date!(2024 - 05 - 10),
        exclude: None,
    };
    let found = store.find_overlapping(&scope).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, pending.id);

    let excluded = store
        .find_overlapping(&DuplicateScope {
            exclude: Some(pending.id),
            ..scope.clone()
        })
        .await?;
    assert!(excluded.is_empty());

    let other_type = store
        .find_overlapping(&DuplicateScope {
            request_type: RequestType::MenuInversion,
            ..scope
        })
        .await?;
    assert!(other_type.is_empty());

    let elapsed = store
        .list_elapsed(
            WorkflowVariant::ApprovalFromSchool,
            &[State::PendingDreValidation],
            date!(2024 - 05 - 15),
        )
        .await?;
    assert_eq!(elapsed.len(), 1);
    assert_eq!(elapsed[0].id, pending.id);

    let all = store.list_by_request_type(RequestType::MenuChange).await?;
    assert_eq!(all.len(), 2);

    let err = store.fetch_audit(SubjectId::new()).await.unwrap_err();
    assert!(matches!(err, Error::SubjectNotFound(_)));

    Ok(())
});
