//! Connection Manager behavior against the in-memory backend.

mod common;

use std::time::Duration;

use bip_persistence::{
    ConnectionHandle, ConnectionManager, DatabaseConfig, ErrorCategory, PersistenceError,
    RetryPolicy, Session,
};
use common::{MockDb, OpenFailure};

fn manager(db: &MockDb) -> ConnectionManager {
    ConnectionManager::new(DatabaseConfig::default(), db.connector())
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success_takes_two_attempts() {
    let db = MockDb::new();
    db.state().open_failures.push_back(OpenFailure::Transient);

    let start = tokio::time::Instant::now();
    let handle = manager(&db).connect().await.unwrap();

    assert!(handle.is_open());
    assert_eq!(db.state().opens, 2);
    assert_eq!(db.state().pings, 1);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_is_not_retried() {
    let db = MockDb::new();
    db.state().open_failures.push_back(OpenFailure::Authentication);

    let start = tokio::time::Instant::now();
    let err = manager(&db).connect().await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Authentication);
    assert_eq!(db.state().opens, 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_returns_original_error() {
    let db = MockDb::new();
    for _ in 0..3 {
        db.state().open_failures.push_back(OpenFailure::Transient);
    }

    let start = tokio::time::Instant::now();
    let err = manager(&db).connect().await.unwrap_err();

    assert!(matches!(err, PersistenceError::Connection { .. }));
    assert!(err.to_string().contains("Connection refused"));
    assert_eq!(db.state().opens, 3);
    // 2 s + 4 s between the three attempts
    assert!(start.elapsed() >= Duration::from_secs(6));
    assert!(start.elapsed() < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn custom_policy_limits_attempts() {
    let db = MockDb::new();
    db.state().open_failures.push_back(OpenFailure::Transient);

    let err = manager(&db)
        .with_retry_policy(RetryPolicy::no_retry())
        .connect()
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(db.state().opens, 1);
}

#[tokio::test]
async fn close_is_idempotent() {
    let db = MockDb::new();
    let mut handle = manager(&db).connect().await.unwrap();

    handle.close().await.unwrap();
    handle.close().await.unwrap();

    assert!(!handle.is_open());
    assert_eq!(db.state().closes, 1);
    assert!(matches!(
        handle.session().err(),
        Some(PersistenceError::HandleClosed)
    ));
}

#[tokio::test]
async fn never_opened_handle_closes_cleanly() {
    let mut handle = ConnectionHandle::closed();
    handle.close().await.unwrap();
    assert!(!handle.is_open());
}

#[tokio::test]
async fn closed_session_rejects_statements() {
    let db = MockDb::new();
    let session = db.session();
    session.ping().await.unwrap();

    session.close().await.unwrap();
    let err = session.ping().await.unwrap_err();
    assert!(matches!(err, PersistenceError::HandleClosed));
}
