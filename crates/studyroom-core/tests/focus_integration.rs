//! Integration tests for the focus session lifecycle.
//!
//! Covers the room-level rules that need more than one component:
//! session conflicts, cross-device recovery, offline fallback through the
//! SQLite snapshot store, and late pulse responses after a stop.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::Notify;

use studyroom_core::remote::{ActiveSession, InMemorySessionStore, RemoteError, SessionStore};
use studyroom_core::storage::{LocalSnapshot, LocalStore, MemoryStore, SqliteStore};
use studyroom_core::timer::{FocusController, FocusSettings, FocusState, FocusTask};
use studyroom_core::{Event, FocusError, ManualClock, RecoverySource};

const ROOM: &str = "room-rust";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()))
}

fn controller(
    clock: &Arc<ManualClock>,
    remote: Arc<dyn SessionStore>,
    local: Arc<dyn LocalStore>,
) -> FocusController {
    FocusController::new(ROOM, remote, local, clock.clone(), FocusSettings::default())
}

fn remote_session(id: &str, elapsed: u64, running: bool, last_pulse_ago: Duration, clock: &ManualClock) -> ActiveSession {
    use studyroom_core::Clock;
    ActiveSession {
        id: id.into(),
        elapsed_time: elapsed,
        is_running: running,
        last_pulse_at: Some(clock.now() - last_pulse_ago),
        topic_id: Some("topic-1".into()),
        topic_title: Some("Borrow checker".into()),
        milestone_id: Some("m1".into()),
        started_at: None,
    }
}

#[tokio::test]
async fn test_start_conflicts_with_other_device() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    remote.insert_active(ROOM, remote_session("other", 60, true, Duration::seconds(3), &clock));

    let focus = controller(&clock, remote.clone(), Arc::new(MemoryStore::new()));
    let err = focus
        .start_session(FocusTask::new("topic-2", "Lifetimes"))
        .await
        .unwrap_err();

    assert!(matches!(err, FocusError::Conflict(_)));
    let snap = focus.snapshot();
    assert_eq!(snap.state, FocusState::Idle);
    assert!(snap.last_error.is_some());
}

#[tokio::test]
async fn test_recovers_recent_remote_session() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    remote.insert_active(ROOM, remote_session("s-42", 600, true, Duration::minutes(10), &clock));

    let focus = controller(&clock, remote, Arc::new(MemoryStore::new()));
    let event = focus.restore().await.unwrap();

    assert!(matches!(
        event,
        Event::SessionRecovered {
            source: RecoverySource::Remote,
            elapsed_seconds: 600,
            running: true,
            ..
        }
    ));
    let snap = focus.snapshot();
    assert_eq!(snap.state, FocusState::Running);
    assert_eq!(snap.session_id.as_deref(), Some("s-42"));
    assert_eq!(snap.task.unwrap().title, "Borrow checker");

    focus.tick();
    assert_eq!(focus.snapshot().elapsed_seconds, 601);
}

#[tokio::test]
async fn test_recovers_paused_remote_session_as_paused() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    remote.insert_active(ROOM, remote_session("s-7", 90, false, Duration::minutes(2), &clock));

    let focus = controller(&clock, remote, Arc::new(MemoryStore::new()));
    focus.restore().await.unwrap();

    assert_eq!(focus.snapshot().state, FocusState::Paused);
    focus.tick();
    assert_eq!(focus.snapshot().elapsed_seconds, 90);
}

#[tokio::test]
async fn test_stale_remote_session_is_not_resumed() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    remote.insert_active(ROOM, remote_session("s-old", 1200, true, Duration::minutes(40), &clock));
    let local = Arc::new(MemoryStore::new());

    let focus = controller(&clock, remote.clone(), local.clone());
    assert!(focus.restore().await.is_none());

    assert_eq!(focus.snapshot().state, FocusState::Idle);
    assert!(local.is_empty());
    // ended so a new session can start
    assert!(remote.active_now(ROOM).is_none());
    assert!(focus.start_session(FocusTask::new("t", "Fresh start")).await.is_ok());
}

#[tokio::test]
async fn test_adopts_session_started_moments_ago_elsewhere() {
    use studyroom_core::Clock;
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    let mut fresh = remote_session("fresh", 2, true, Duration::zero(), &clock);
    fresh.last_pulse_at = None;
    fresh.started_at = Some(clock.now() - Duration::seconds(2));
    remote.insert_active(ROOM, fresh);

    let focus = controller(&clock, remote.clone(), Arc::new(MemoryStore::new()));
    let event = focus.restore().await.unwrap();

    assert!(matches!(
        event,
        Event::SessionRecovered {
            source: RecoverySource::Remote,
            running: true,
            ..
        }
    ));
    assert_eq!(focus.snapshot().session_id.as_deref(), Some("fresh"));
    assert_eq!(remote.active_now(ROOM).unwrap().id, "fresh");
}

#[tokio::test]
async fn test_undated_remote_session_is_left_alone() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    let mut undated = remote_session("undated", 30, true, Duration::zero(), &clock);
    undated.last_pulse_at = None;
    remote.insert_active(ROOM, undated);

    let focus = controller(&clock, remote.clone(), Arc::new(MemoryStore::new()));
    assert!(focus.restore().await.is_none());

    assert_eq!(focus.snapshot().state, FocusState::Idle);
    assert_eq!(remote.active_now(ROOM).unwrap().id, "undated");
}

#[tokio::test]
async fn test_stop_clears_local_snapshot() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    let local = Arc::new(MemoryStore::new());
    let focus = controller(&clock, remote.clone(), local.clone());

    focus.start_session(FocusTask::new("t1", "Modules")).await.unwrap();
    for _ in 0..30 {
        focus.tick();
    }
    clock.advance(Duration::seconds(30));
    focus.pulse().await.unwrap();
    assert_eq!(remote.active_now(ROOM).unwrap().elapsed_time, 30);

    let event = focus.complete_session().await.unwrap();
    assert!(matches!(
        event,
        Event::SessionCompleted {
            elapsed_seconds: 30,
            ..
        }
    ));
    assert!(local.is_empty());
    assert!(remote.active_now(ROOM).is_none());
}

#[tokio::test]
async fn test_pulses_are_rate_limited() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    let focus = controller(&clock, remote.clone(), Arc::new(MemoryStore::new()));
    focus.start_session(FocusTask::new("t1", "Traits")).await.unwrap();

    // one attempt per second for 12 seconds
    let mut accepted = 0;
    for _ in 0..12 {
        clock.advance(Duration::seconds(1));
        focus.tick();
        if focus.pulse().await.is_some() {
            accepted += 1;
        }
    }
    assert!(accepted <= 3);
    assert_eq!(accepted, 2);
    assert_eq!(remote.pulse_count(), 2);
}

#[tokio::test]
async fn test_offline_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studyroom.db");
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    remote.set_offline(true);

    {
        let local = Arc::new(SqliteStore::open_at(&path).unwrap());
        let focus = controller(&clock, remote.clone(), local);
        let snap = focus.start_session(FocusTask::new("t1", "Async")).await.unwrap();
        assert!(snap.local_only);
        for _ in 0..5 {
            clock.advance(Duration::seconds(1));
            focus.tick();
        }
        // local-only pulses never reach the store
        let event = focus.pulse().await.unwrap();
        assert!(matches!(event, Event::Pulsed { synced: false, elapsed_seconds: 5, .. }));
        focus.pause_session();
    }

    clock.advance(Duration::minutes(45));
    let local = Arc::new(SqliteStore::open_at(&path).unwrap());
    let focus = controller(&clock, remote, local);
    let event = focus.restore().await.unwrap();

    assert!(matches!(
        event,
        Event::SessionRecovered {
            source: RecoverySource::Local,
            elapsed_seconds: 5,
            running: false,
            ..
        }
    ));
    let snap = focus.snapshot();
    assert_eq!(snap.state, FocusState::Paused);
    assert!(snap.local_only);

    // stopping a local-only session never calls the store
    assert!(focus.stop_session().await.is_some());
    assert_eq!(focus.snapshot().state, FocusState::Idle);
}

#[tokio::test]
async fn test_local_snapshot_written_on_every_transition() {
    let clock = clock();
    let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
    let local = Arc::new(MemoryStore::new());
    let focus = controller(&clock, remote, local.clone());
    let key = "focusTimer_room-rust";

    focus.start_session(FocusTask::new("t1", "Errors")).await.unwrap();
    let saved = LocalSnapshot::read(local.as_ref(), key).unwrap().unwrap();
    assert_eq!(saved.session.elapsed_seconds, 0);

    for _ in 0..7 {
        focus.tick();
    }
    focus.pause_session();
    let saved = LocalSnapshot::read(local.as_ref(), key).unwrap().unwrap();
    assert_eq!(saved.session.elapsed_seconds, 7);
    assert!(!saved.session.is_running);
}

/// Delegates to an in-memory store but holds each pulse until released.
struct GatedStore {
    inner: InMemorySessionStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SessionStore for GatedStore {
    async fn start(&self, room_id: &str, task: &FocusTask) -> Result<String, RemoteError> {
        self.inner.start(room_id, task).await
    }

    async fn pulse(&self, room_id: &str, session_id: &str, elapsed_seconds: u64) -> Result<(), RemoteError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.pulse(room_id, session_id, elapsed_seconds).await
    }

    async fn end(&self, room_id: &str, session_id: &str) -> Result<(), RemoteError> {
        self.inner.end(room_id, session_id).await
    }

    async fn active(&self, room_id: &str) -> Result<Option<ActiveSession>, RemoteError> {
        self.inner.active(room_id).await
    }
}

#[tokio::test]
async fn test_late_pulse_after_stop_is_ignored() {
    let clock = clock();
    let gate = Arc::new(GatedStore {
        inner: InMemorySessionStore::new(clock.clone()),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let local = Arc::new(MemoryStore::new());
    let focus = controller(&clock, gate.clone(), local.clone());

    focus.start_session(FocusTask::new("t1", "Pinning")).await.unwrap();
    clock.advance(Duration::seconds(5));

    let pulsing = focus.clone();
    let in_flight = tokio::spawn(async move { pulsing.pulse().await });
    gate.entered.notified().await;

    focus.stop_session().await.unwrap();
    gate.release.notify_one();

    assert!(in_flight.await.unwrap().is_none());
    let snap = focus.snapshot();
    assert_eq!(snap.state, FocusState::Idle);
    assert!(snap.last_error.is_none());
    assert!(snap.last_synced_at.is_none());
    assert!(local.is_empty());
}
