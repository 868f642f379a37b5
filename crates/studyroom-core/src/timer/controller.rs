//! Focus session controller.
//!
//! Owns one [`FocusTimer`] for one room and keeps it in step with the
//! session store and the on-device snapshot:
//!
//! - every transition writes the local snapshot before anything else
//! - remote calls run outside the state lock and never block a tick
//! - remote failures degrade to local-only operation; only an explicit
//!   rejection of `start_session` reaches the caller
//! - results of remote calls that finish after the session was stopped or
//!   replaced are dropped (generation check)

use chrono::Duration;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use super::engine::FocusTimer;
use super::session::{local_session_id, FocusSession, FocusSnapshot, FocusTask, LOCAL_SESSION_PREFIX};
use crate::clock::Clock;
use crate::error::{ConfigError, FocusError};
use crate::events::{Event, RecoverySource};
use crate::remote::{ActiveSession, RemoteError, SessionStore};
use crate::storage::{focus_key, FocusConfig, LocalSnapshot, LocalStore};

/// Timing rules for one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusSettings {
    pub pulse_interval: Duration,
    pub stale_after: Duration,
    pub local_ttl: Duration,
    pub default_target_minutes: u32,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            pulse_interval: Duration::seconds(5),
            stale_after: Duration::minutes(30),
            local_ttl: Duration::hours(24),
            default_target_minutes: 25,
        }
    }
}

impl TryFrom<&FocusConfig> for FocusSettings {
    type Error = ConfigError;

    fn try_from(cfg: &FocusConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pulse_interval: cfg.pulse_interval()?,
            stale_after: cfg.stale_after()?,
            local_ttl: cfg.local_ttl()?,
            default_target_minutes: cfg.default_target_minutes,
        })
    }
}

/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct FocusController {
    room_id: String,
    user_id: Option<String>,
    storage_key: String,
    settings: FocusSettings,
    timer: Arc<Mutex<FocusTimer>>,
    remote: Arc<dyn SessionStore>,
    local: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    updates: Arc<watch::Sender<FocusSnapshot>>,
}

impl FocusController {
    pub fn new(
        room_id: impl Into<String>,
        remote: Arc<dyn SessionStore>,
        local: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
        settings: FocusSettings,
    ) -> Self {
        let room_id = room_id.into();
        let timer = FocusTimer::new(settings.default_target_minutes);
        let (updates, _) = watch::channel(timer.snapshot());
        Self {
            storage_key: focus_key(&room_id),
            room_id,
            user_id: None,
            settings,
            timer: Arc::new(Mutex::new(timer)),
            remote,
            local,
            clock,
            updates: Arc::new(updates),
        }
    }

    /// Attach the current user for log context.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn settings(&self) -> &FocusSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        self.lock().snapshot()
    }

    /// Observe every state change. The receiver starts at the current
    /// snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FocusSnapshot> {
        self.updates.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Recover state when the view mounts.
    ///
    /// A fresh remote session is adopted (cross-tab or cross-device
    /// handoff). Stale or absent remote state wipes the local snapshot. If
    /// the store cannot be reached, an unexpired local snapshot is used.
    pub async fn restore(&self) -> Option<Event> {
        if self.lock().session().is_some() {
            return None;
        }

        let now = self.clock.now();
        let local = self.read_local();

        match self.remote.active(&self.room_id).await {
            Ok(Some(active)) if active.is_fresh(now, self.settings.stale_after) => {
                let session = merge_with_local(&active, local.as_ref(), now);
                tracing::info!(
                    room = %self.room_id,
                    user = ?self.user_id,
                    session = %session.session_id,
                    elapsed = session.elapsed_seconds,
                    "resuming focus session from session store"
                );
                Some(self.install(session, RecoverySource::Remote))
            }
            Ok(Some(other)) => {
                tracing::info!(room = %self.room_id, session = %other.id, "ignoring stale focus session");
                self.clear_local();
                // Without any timestamp the session may still be live elsewhere.
                if other.is_stale(now, self.settings.stale_after) {
                    if let Err(e) = self.remote.end(&self.room_id, &other.id).await {
                        tracing::debug!(error = %e, "could not end stale session");
                    }
                }
                self.publish();
                None
            }
            Ok(None) => {
                self.clear_local();
                self.publish();
                None
            }
            Err(e) => {
                tracing::warn!(room = %self.room_id, error = %e, "session store unavailable, using local state");
                let snapshot = local.filter(|s| !s.is_expired(now, self.settings.local_ttl));
                match snapshot {
                    Some(snapshot) => Some(self.install(snapshot.session, RecoverySource::Local)),
                    None => {
                        self.clear_local();
                        let mut timer = self.lock();
                        timer.record_error(offline_message(&e));
                        self.updates.send_replace(timer.snapshot());
                        None
                    }
                }
            }
        }
    }

    /// Start timing `task`.
    ///
    /// # Errors
    ///
    /// - [`FocusError::AlreadyActive`] if this controller already has a session
    /// - [`FocusError::Conflict`] if the store reports another active session
    /// - [`FocusError::Rejected`] for any other explicit refusal
    ///
    /// A network failure is not an error: the session starts locally.
    pub async fn start_session(&self, task: FocusTask) -> Result<FocusSnapshot, FocusError> {
        self.ensure_idle()?;

        let session_id = match self.remote.start(&self.room_id, &task).await {
            Ok(id) => id,
            Err(RemoteError::Network(message)) => {
                let id = local_session_id(self.clock.now());
                tracing::warn!(room = %self.room_id, %message, local_id = %id, "starting focus session offline");
                id
            }
            Err(e) => return Err(self.reject_start(e)),
        };

        let now = self.clock.now();
        let started = {
            let mut timer = self.lock();
            if timer.begin(session_id.clone(), task, now).is_some() {
                self.persist(&mut timer);
                let snapshot = timer.snapshot();
                self.updates.send_replace(snapshot.clone());
                Ok(snapshot)
            } else {
                Err(FocusError::AlreadyActive {
                    session_id: timer
                        .session()
                        .map(|s| s.session_id.clone())
                        .unwrap_or_default(),
                })
            }
        };

        match &started {
            Ok(_) => {
                tracing::info!(room = %self.room_id, user = ?self.user_id, session = %session_id, "focus session started");
            }
            // Lost a race with another start while the request was in flight.
            Err(_) if !session_id.starts_with(LOCAL_SESSION_PREFIX) => {
                if let Err(e) = self.remote.end(&self.room_id, &session_id).await {
                    tracing::debug!(session = %session_id, error = %e, "could not end duplicate session");
                }
            }
            Err(_) => {}
        }
        started
    }

    pub fn pause_session(&self) -> Option<Event> {
        let now = self.clock.now();
        let mut timer = self.lock();
        let event = timer.pause(now)?;
        self.persist(&mut timer);
        self.updates.send_replace(timer.snapshot());
        Some(event)
    }

    pub fn resume_session(&self) -> Option<Event> {
        let now = self.clock.now();
        let mut timer = self.lock();
        let event = timer.resume(now)?;
        self.persist(&mut timer);
        self.updates.send_replace(timer.snapshot());
        Some(event)
    }

    /// End the session. Local state is always cleared; ending it remotely is
    /// best effort.
    pub async fn stop_session(&self) -> Option<Event> {
        self.finish(false).await
    }

    /// Like [`Self::stop_session`], reported as a finished task.
    pub async fn complete_session(&self) -> Option<Event> {
        self.finish(true).await
    }

    // ── Periodic work ────────────────────────────────────────────────

    /// One-second tick.
    pub fn tick(&self) -> Option<Event> {
        let now = self.clock.now();
        let mut timer = self.lock();
        let event = timer.tick(now);
        self.updates.send_replace(timer.snapshot());
        event
    }

    pub fn pulse_due(&self) -> bool {
        self.lock()
            .pulse_due(self.clock.now(), self.settings.pulse_interval)
    }

    /// Write progress locally and report it to the session store.
    ///
    /// Returns `None` when no pulse was due or its response arrived after
    /// the session ended.
    pub async fn pulse(&self) -> Option<Event> {
        let now = self.clock.now();
        let ticket = {
            let mut timer = self.lock();
            let ticket = timer.claim_pulse(now, self.settings.pulse_interval)?;
            self.persist(&mut timer);
            ticket
        };

        if ticket.local_only {
            return Some(Event::Pulsed {
                session_id: ticket.session_id,
                elapsed_seconds: ticket.elapsed_seconds,
                synced: false,
                at: now,
            });
        }

        let result = self
            .remote
            .pulse(&self.room_id, &ticket.session_id, ticket.elapsed_seconds)
            .await;

        let mut timer = self.lock();
        if !timer.is_current(ticket.generation) {
            tracing::debug!(session = %ticket.session_id, "dropping pulse response for ended session");
            return None;
        }
        let synced = match result {
            Ok(()) => {
                timer.mark_synced(self.clock.now());
                true
            }
            Err(e) => {
                tracing::warn!(room = %self.room_id, session = %ticket.session_id, error = %e, "focus pulse failed");
                timer.record_error(offline_message(&e));
                false
            }
        };
        self.updates.send_replace(timer.snapshot());
        Some(Event::Pulsed {
            session_id: ticket.session_id,
            elapsed_seconds: ticket.elapsed_seconds,
            synced,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, FocusTimer> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reject_start(&self, err: RemoteError) -> FocusError {
        let err = match err {
            RemoteError::Conflict(message) => FocusError::Conflict(message),
            RemoteError::Rejected { status, message } => FocusError::Rejected { status, message },
            RemoteError::Decode(message) | RemoteError::Network(message) => {
                FocusError::Rejected { status: 0, message }
            }
        };
        tracing::warn!(room = %self.room_id, error = %err, "focus session start refused");
        let mut timer = self.lock();
        timer.record_error(err.to_string());
        self.updates.send_replace(timer.snapshot());
        err
    }

    fn ensure_idle(&self) -> Result<(), FocusError> {
        match self.lock().session() {
            Some(session) => Err(FocusError::AlreadyActive {
                session_id: session.session_id.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn finish(&self, completed: bool) -> Option<Event> {
        let now = self.clock.now();
        let (session, event) = {
            let mut timer = self.lock();
            let finished = timer.finish(completed, now)?;
            self.clear_local();
            timer.clear_error();
            self.updates.send_replace(timer.snapshot());
            finished
        };
        tracing::info!(
            room = %self.room_id,
            session = %session.session_id,
            elapsed = session.elapsed_seconds,
            completed,
            "focus session ended"
        );

        if !session.is_local() {
            if let Err(e) = self.remote.end(&self.room_id, &session.session_id).await {
                tracing::warn!(session = %session.session_id, error = %e, "could not end focus session remotely");
            }
        }
        Some(event)
    }

    fn install(&self, session: FocusSession, source: RecoverySource) -> Event {
        let now = self.clock.now();
        let mut timer = self.lock();
        let event = timer.adopt(session, source, now);
        self.persist(&mut timer);
        self.updates.send_replace(timer.snapshot());
        event
    }

    fn persist(&self, timer: &mut FocusTimer) {
        let Some(session) = timer.session().cloned() else {
            return;
        };
        let snapshot = LocalSnapshot::new(session, self.clock.now());
        if let Err(e) = snapshot.write(self.local.as_ref(), &self.storage_key) {
            tracing::warn!(key = %self.storage_key, error = %e, "could not save focus snapshot");
            timer.record_error(format!("Progress could not be saved on this device: {e}"));
        }
    }

    fn read_local(&self) -> Option<LocalSnapshot> {
        match LocalSnapshot::read(self.local.as_ref(), &self.storage_key) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(key = %self.storage_key, error = %e, "could not read focus snapshot");
                None
            }
        }
    }

    fn clear_local(&self) {
        if let Err(e) = self.local.clear(&self.storage_key) {
            tracing::warn!(key = %self.storage_key, error = %e, "could not clear focus snapshot");
        }
    }

    fn publish(&self) {
        let timer = self.lock();
        self.updates.send_replace(timer.snapshot());
    }
}

/// Remote state wins, except that the same session's local copy may be
/// ahead on elapsed time, knows the task's target, and reflects a pause or
/// resume made after the last pulse.
fn merge_with_local(
    active: &ActiveSession,
    local: Option<&LocalSnapshot>,
    now: chrono::DateTime<chrono::Utc>,
) -> FocusSession {
    let mut session = active.to_session(now);
    if let Some(local) = local.filter(|l| l.session.session_id == active.id) {
        session.elapsed_seconds = session.elapsed_seconds.max(local.session.elapsed_seconds);
        session.task.target_minutes = local.session.task.target_minutes;
        session.started_at = local.session.started_at;
        if active.last_pulse_at.map_or(true, |pulsed| local.saved_at >= pulsed) {
            session.is_running = local.session.is_running;
        }
        if session.task.title.is_empty() {
            session.task.title = local.session.task.title.clone();
        }
    }
    session
}

fn offline_message(err: &RemoteError) -> String {
    if err.is_network() {
        "Working offline: progress is saved on this device and will sync later".into()
    } else {
        format!("Could not sync focus session: {err}")
    }
}
