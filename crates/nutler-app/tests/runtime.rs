//! Runtime loop tests on virtual time.
//!
//! `SimEnv` completes every sleep immediately while recording it, so one
//! `step()` per timer expiry walks the whole reconnection schedule.

use std::time::Duration;

use nutler_app::{Intent, JoinForm, Runtime, SessionConfig, SessionController, View};
use nutler_core::ConnectionState;
use nutler_harness::{InvariantRegistry, MemorySessionStore, SessionSnapshot, SimBackend, SimEnv};
use nutler_proto::User;
use tokio::sync::mpsc;

type SimRuntime = Runtime<SimBackend, MemorySessionStore, SimEnv>;

fn runtime() -> (SimBackend, SimEnv, mpsc::Sender<Intent>, SimRuntime) {
    nutler_harness::init_tracing();
    let backend = SimBackend::seeded();
    backend.set_next_user_id(7);
    let env = SimEnv::new();
    let store = MemorySessionStore::new();
    let session = SessionController::new(backend.clone(), store, SessionConfig::default());
    let (tx, rx) = mpsc::channel(16);
    let runtime = Runtime::new(session, env.clone(), rx);
    (backend, env, tx, runtime)
}

async fn send(tx: &mpsc::Sender<Intent>, runtime: &mut SimRuntime, intent: Intent) {
    tx.send(intent).await.unwrap();
    assert!(runtime.step().await);
}

async fn joined() -> (SimBackend, SimEnv, mpsc::Sender<Intent>, SimRuntime) {
    let (backend, env, tx, mut runtime) = runtime();
    send(&tx, &mut runtime, Intent::Join(JoinForm::new("Jane", "jane@corp.io", 1))).await;
    assert_eq!(runtime.session().connection_state(), ConnectionState::Connected);
    (backend, env, tx, runtime)
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|s| Duration::from_secs(*s)).collect()
}

/// INVARIANT: a lost link is retried at most five times with doubling delays.
#[tokio::test]
async fn loss_with_dead_server_exhausts_after_five_attempts() {
    let (backend, env, tx, mut runtime) = joined().await;
    let registry = InvariantRegistry::standard();
    backend.fail_connects(5);

    backend.emit_connection_lost();
    assert!(runtime.step().await);
    assert_eq!(runtime.pending_retry().map(|retry| retry.attempt), Some(1));
    assert_eq!(
        runtime.session().status_message(),
        Some("Connection lost, retrying in 1s (attempt 1/5)")
    );

    for _ in 0..5 {
        assert!(runtime.step().await);
        registry.assert_all(&SessionSnapshot::from_session(runtime.session()), "during backoff");
    }

    assert_eq!(env.recorded_sleeps(), secs(&[1, 2, 4, 8, 16]));
    assert_eq!(env.elapsed(), Duration::from_secs(31));
    assert_eq!(backend.connect_attempts().len(), 6);
    assert_eq!(runtime.session().connection_state(), ConnectionState::Disconnected);
    assert_eq!(
        runtime.session().status_message(),
        Some("Disconnected after 5 reconnection attempts")
    );
    assert!(runtime.pending_retry().is_none());

    send(&tx, &mut runtime, Intent::Reconnect).await;
    assert_eq!(runtime.session().connection_state(), ConnectionState::Connected);
    assert_eq!(runtime.session().status_message(), None);
}

/// INVARIANT: a successful retry resets the attempt counter.
#[tokio::test]
async fn recovery_on_third_attempt_resets_counter() {
    let (backend, env, _tx, mut runtime) = joined().await;
    backend.fail_connects(2);

    backend.emit_connection_lost();
    assert!(runtime.step().await);
    for _ in 0..3 {
        assert!(runtime.step().await);
    }

    assert_eq!(env.recorded_sleeps(), secs(&[1, 2, 4]));
    assert_eq!(runtime.session().connection_state(), ConnectionState::Connected);
    assert_eq!(runtime.session().reconnect_attempt(), 0);
    assert!(runtime.pending_retry().is_none());
    assert_eq!(runtime.session().status_message(), None);

    // A later loss starts the schedule over.
    backend.emit_connection_lost();
    assert!(runtime.step().await);
    assert!(runtime.step().await);
    assert_eq!(env.recorded_sleeps(), secs(&[1, 2, 4, 1]));
}

#[tokio::test]
async fn retry_dials_the_room_active_when_it_fires() {
    let (backend, _env, tx, mut runtime) = joined().await;
    send(&tx, &mut runtime, Intent::EnterRoom(backend.room(2).unwrap())).await;

    backend.emit_connection_lost();
    assert!(runtime.step().await);
    send(&tx, &mut runtime, Intent::Back).await;
    send(&tx, &mut runtime, Intent::EnterRoom(backend.room(3).unwrap())).await;
    assert!(runtime.step().await);

    let last = backend.connect_attempts().pop().unwrap();
    assert_eq!(last.room_name, "Sales Floor");
    assert_eq!(last.room_id, 3);
    assert_eq!(runtime.session().connection_state(), ConnectionState::Connected);
}

/// INVARIANT: a message received before a room switch is judged against the
/// room that was active when it arrived.
#[tokio::test]
async fn queued_message_is_not_attributed_to_the_next_room() {
    let (backend, _env, tx, mut runtime) = joined().await;
    send(&tx, &mut runtime, Intent::EnterRoom(backend.room(2).unwrap())).await;

    backend.emit_chat("Sam", "Sales Floor", "quota", 1_700_000_000);
    tx.send(Intent::Back).await.unwrap();
    tx.send(Intent::EnterRoom(backend.room(3).unwrap())).await.unwrap();
    for _ in 0..3 {
        assert!(runtime.step().await);
    }

    assert_eq!(runtime.session().ingestor().active_room(), Some("Sales Floor"));
    assert!(runtime.session().log().is_empty());

    backend.emit_chat("Sam", "Sales Floor", "quota met", 1_700_000_060);
    assert!(runtime.step().await);
    let texts: Vec<_> =
        runtime.session().log().messages().iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, vec!["quota met".to_string()]);
}

/// INVARIANT: a message already received is ingested before a queued intent.
#[tokio::test]
async fn push_events_take_priority_over_intents() {
    let (backend, _env, tx, mut runtime) = joined().await;
    send(&tx, &mut runtime, Intent::EnterRoom(backend.room(2).unwrap())).await;

    backend.emit_chat("Bob", "IT General", "hi", 1_700_000_000);
    tx.send(Intent::Back).await.unwrap();
    assert!(runtime.step().await);

    assert_eq!(runtime.session().log().len(), 1);
    assert!(matches!(runtime.session().view(), View::Chat(_)));

    assert!(runtime.step().await);
    assert_eq!(runtime.session().view(), &View::Rooms);
    assert!(runtime.session().log().is_empty());
}

#[tokio::test]
async fn send_intent_round_trips_through_echo() {
    let (backend, _env, tx, mut runtime) = joined().await;
    send(&tx, &mut runtime, Intent::EnterRoom(backend.room(2).unwrap())).await;

    send(&tx, &mut runtime, Intent::Send { text: "hello".into(), is_emoji: false }).await;
    assert!(runtime.session().log().is_empty());
    assert!(runtime.step().await);

    let texts: Vec<_> =
        runtime.session().log().messages().iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, vec!["hello".to_string()]);
}

/// INVARIANT: teardown cancels the retry timer and the subscription.
#[tokio::test]
async fn shutdown_cancels_retry_and_unsubscribes() {
    let (backend, env, tx, mut runtime) = joined().await;
    backend.emit_connection_lost();
    assert!(runtime.step().await);
    assert!(runtime.pending_retry().is_some());

    tx.send(Intent::Shutdown).await.unwrap();
    assert!(!runtime.step().await);
    let session = runtime.teardown();

    assert_eq!(session.connection_state(), ConnectionState::Idle);
    assert_eq!(backend.subscriber_count(), 0);
    assert!(env.recorded_sleeps().is_empty());
}

#[tokio::test]
async fn closed_subscription_keeps_loop_alive() {
    let (backend, _env, tx, mut runtime) = joined().await;

    backend.close_subscriptions();
    assert!(runtime.step().await);
    assert!(!runtime.is_subscribed());

    send(&tx, &mut runtime, Intent::RefreshRooms).await;
    tx.send(Intent::Shutdown).await.unwrap();
    assert!(!runtime.step().await);
}

#[tokio::test]
async fn run_resumes_then_processes_intents() {
    nutler_harness::init_tracing();
    let backend = SimBackend::seeded();
    backend.add_user(User {
        id: Some(7),
        name: "Jane".into(),
        email: "jane@corp.io".into(),
        department_id: Some(1),
        department_name: Some("IT".into()),
        is_online: false,
        last_seen: None,
    });
    let session = SessionController::new(
        backend.clone(),
        MemorySessionStore::with_id(7),
        SessionConfig::default(),
    );
    let (tx, rx) = mpsc::channel(4);
    tx.send(Intent::EnterRoom(backend.room(2).unwrap())).await.unwrap();
    tx.send(Intent::Shutdown).await.unwrap();

    let session = Runtime::new(session, SimEnv::new(), rx).run().await;

    assert!(matches!(session.view(), View::Chat(room) if room.name == "IT General"));
    assert_eq!(backend.connect_attempts().len(), 1);
    assert_eq!(backend.subscriber_count(), 0);
}

#[tokio::test]
async fn dropped_intent_sender_stops_the_loop() {
    let (_backend, _env, tx, mut runtime) = runtime();
    drop(tx);
    assert!(!runtime.step().await);
}
