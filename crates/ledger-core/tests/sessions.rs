use ledger_core::{Ledger, LedgerDb, SessionStatus};

fn ledger() -> Ledger {
    Ledger::new(LedgerDb::open_in_memory().unwrap())
}

#[tokio::test]
async fn test_external_id_resolves_to_same_session() {
    let ledger = ledger();
    let first = ledger
        .get_or_create_session("t", "p", Some("run-1"))
        .await
        .unwrap();
    let again = ledger
        .get_or_create_session("t", "p", Some("run-1"))
        .await
        .unwrap();
    assert_eq!(first, again);

    let session = ledger.sessions().get_session("run-1").await.unwrap().unwrap();
    assert_eq!(session.id, first);
    assert_eq!(session.project_id, "p");
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.ended_at.is_none());

    // Tenant and project are created on demand
    assert!(ledger.projects().get_project("p").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sessions_without_external_id_are_always_new() {
    let ledger = ledger();
    let a = ledger.get_or_create_session("t", "p", None).await.unwrap();
    let b = ledger.get_or_create_session("t", "p", None).await.unwrap();
    assert_ne!(a, b);
    assert_eq!(ledger.sessions().list_sessions("p").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_end_unknown_session_creates_nothing() {
    let ledger = ledger();
    assert!(!ledger.end_session("missing").await.unwrap());
    assert!(ledger.sessions().get_session("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pause_resume_and_end() {
    let ledger = ledger();
    let sessions = ledger.sessions();
    ledger
        .get_or_create_session("t", "p", Some("run-1"))
        .await
        .unwrap();

    assert!(sessions.pause_session("run-1").await.unwrap());
    let paused = sessions.get_session("run-1").await.unwrap().unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);

    assert!(sessions.resume_session("run-1").await.unwrap());
    assert_eq!(
        sessions.get_session("run-1").await.unwrap().unwrap().status,
        SessionStatus::Active
    );

    assert!(ledger.end_session("run-1").await.unwrap());
    let ended = sessions.get_session("run-1").await.unwrap().unwrap();
    assert_eq!(ended.status, SessionStatus::Ended);
    assert!(ended.ended_at.is_some());

    // Ended is terminal
    assert!(!sessions.resume_session("run-1").await.unwrap());
    assert!(!sessions.pause_session("run-1").await.unwrap());
    assert!(!ledger.end_session("run-1").await.unwrap());
    let still_ended = sessions.get_session("run-1").await.unwrap().unwrap();
    assert_eq!(still_ended.status, SessionStatus::Ended);
    assert_eq!(still_ended.ended_at, ended.ended_at);
}

#[tokio::test]
async fn test_transitions_require_the_matching_source_status() {
    let ledger = ledger();
    let sessions = ledger.sessions();
    ledger
        .get_or_create_session("t", "p", Some("run-2"))
        .await
        .unwrap();

    // Resuming an active session changes nothing
    let before = sessions.get_session("run-2").await.unwrap().unwrap();
    assert!(!sessions.resume_session("run-2").await.unwrap());
    let after = sessions.get_session("run-2").await.unwrap().unwrap();
    assert_eq!(after.status, SessionStatus::Active);
    assert_eq!(after.last_active, before.last_active);

    assert!(sessions.pause_session("run-2").await.unwrap());
    let paused = sessions.get_session("run-2").await.unwrap().unwrap();
    assert!(!sessions.pause_session("run-2").await.unwrap());
    let still_paused = sessions.get_session("run-2").await.unwrap().unwrap();
    assert_eq!(still_paused.status, SessionStatus::Paused);
    assert_eq!(still_paused.last_active, paused.last_active);

    // A paused session can still be ended
    assert!(ledger.end_session("run-2").await.unwrap());
    assert_eq!(
        sessions.get_session("run-2").await.unwrap().unwrap().status,
        SessionStatus::Ended
    );
}
