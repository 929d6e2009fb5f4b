//! Session resume from the persistence port.

use nutler_app::{
    Command, FileSessionStore, JoinForm, ResumeOutcome, SessionConfig, SessionController,
    SessionStore, View,
};
use nutler_core::ConnectionState;
use nutler_harness::{MemorySessionStore, SimBackend};
use nutler_proto::User;

fn jane(id: i64) -> User {
    User {
        id: Some(id),
        name: "Jane".into(),
        email: "jane@corp.io".into(),
        department_id: Some(1),
        department_name: Some("IT".into()),
        is_online: false,
        last_seen: None,
    }
}

fn session<S: SessionStore>(backend: &SimBackend, store: S) -> SessionController<SimBackend, S> {
    nutler_harness::init_tracing();
    SessionController::new(backend.clone(), store, SessionConfig::default())
}

#[tokio::test]
async fn cached_id_resumes_to_room_list() {
    let backend = SimBackend::seeded();
    backend.add_user(jane(7));
    let store = MemorySessionStore::with_id(7);
    let mut session = session(&backend, store.clone());

    let outcome = session.resume().await.unwrap();

    assert_eq!(outcome, ResumeOutcome::Resumed { user_id: 7 });
    assert_eq!(session.view(), &View::Rooms);
    assert_eq!(session.user().map(|user| user.name.as_str()), Some("Jane"));
    assert_eq!(session.catalog().rooms().len(), 3);
    assert_eq!(store.stored_id(), Some(7));
    assert_eq!(store.clear_count(), 0);
    assert!(backend.connect_attempts().is_empty());
    assert_eq!(session.connection_state(), ConnectionState::Idle);
}

/// INVARIANT: an id that no longer resolves to a user is cleared.
#[tokio::test]
async fn unknown_id_is_cleared() {
    let backend = SimBackend::seeded();
    let store = MemorySessionStore::with_id(42);
    let mut session = session(&backend, store.clone());

    let outcome = session.resume().await.unwrap();

    assert_eq!(outcome, ResumeOutcome::Stale);
    assert_eq!(session.view(), &View::Login);
    assert!(session.user().is_none());
    assert_eq!(store.stored_id(), None);
    assert_eq!(store.clear_count(), 1);
    assert_eq!(session.catalog().departments().len(), 2);
}

#[tokio::test]
async fn unreadable_id_is_cleared() {
    let backend = SimBackend::seeded();
    let store = MemorySessionStore::corrupt();
    let mut session = session(&backend, store.clone());

    let outcome = session.resume().await.unwrap();

    assert_eq!(outcome, ResumeOutcome::Stale);
    assert_eq!(store.clear_count(), 1);
    assert_eq!(backend.call_count(Command::GetUserById), 0);
}

#[tokio::test]
async fn lookup_failure_is_treated_as_stale() {
    let backend = SimBackend::seeded();
    backend.add_user(jane(7));
    backend.fail_next(Command::GetUserById, "database is locked");
    let store = MemorySessionStore::with_id(7);
    let mut session = session(&backend, store.clone());

    let outcome = session.resume().await.unwrap();

    assert_eq!(outcome, ResumeOutcome::Stale);
    assert_eq!(session.view(), &View::Login);
    assert_eq!(store.stored_id(), None);
}

#[tokio::test]
async fn no_session_stays_on_login_with_departments() {
    let backend = SimBackend::seeded();
    let store = MemorySessionStore::new();
    let mut session = session(&backend, store.clone());

    let outcome = session.resume().await.unwrap();

    assert_eq!(outcome, ResumeOutcome::NoSession);
    assert_eq!(session.view(), &View::Login);
    assert_eq!(store.clear_count(), 0);
    assert_eq!(session.catalog().departments().len(), 2);
}

#[tokio::test]
async fn removed_user_after_restart_falls_back_to_login() {
    let backend = SimBackend::seeded();
    backend.add_user(jane(7));
    let store = MemorySessionStore::with_id(7);
    backend.remove_user(7);
    let mut session = session(&backend, store.clone());

    assert_eq!(session.resume().await.unwrap(), ResumeOutcome::Stale);
    assert_eq!(store.stored_id(), None);
}

/// INVARIANT: entering a room after resume opens the link to that room.
#[tokio::test]
async fn entering_room_after_resume_dials_the_room() {
    let backend = SimBackend::seeded();
    backend.add_user(jane(7));
    let mut session = session(&backend, MemorySessionStore::with_id(7));
    session.resume().await.unwrap();

    session.enter_room(backend.room(2).unwrap()).await.unwrap();

    let dials = backend.connect_attempts();
    assert_eq!(dials.len(), 1);
    assert_eq!(dials[0].room_name, "IT General");
    assert_eq!(dials[0].address, "127.0.0.1:3625");
    assert_eq!(backend.listening_port(), Some(3625));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let backend = SimBackend::seeded();
    backend.set_next_user_id(7);

    let mut first = session(&backend, FileSessionStore::new(&path));
    first.join(JoinForm::new("Jane", "jane@corp.io", 1)).await.unwrap();
    drop(first);

    let mut second = session(&backend, FileSessionStore::new(&path));
    let outcome = second.resume().await.unwrap();

    assert_eq!(outcome, ResumeOutcome::Resumed { user_id: 7 });
    assert_eq!(second.view(), &View::Rooms);
}
