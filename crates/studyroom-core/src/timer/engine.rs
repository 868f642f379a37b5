//! Focus timer state machine.
//!
//! The engine is pure: no I/O, no threads, every command takes `now`.
//! [`super::FocusController`] wires it to the session store and the local
//! snapshot; the caller (or [`super::FocusDriver`]) calls `tick()` once per
//! second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Idle
//! ```
//!
//! Completion is a stop that also reports the finished task.

use chrono::{DateTime, Duration, Utc};

use super::session::{progress_pct, FocusSession, FocusSnapshot, FocusState, FocusTask};
use crate::events::{Event, RecoverySource};

/// Claim on one pulse window, handed to the network half of a pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseTicket {
    pub generation: u64,
    pub session_id: String,
    pub elapsed_seconds: u64,
    pub local_only: bool,
}

#[derive(Debug, Clone)]
pub struct FocusTimer {
    session: Option<FocusSession>,
    /// Bumped whenever the active session is replaced or cleared, so
    /// results of in-flight remote calls can tell they are stale.
    generation: u64,
    /// Start of the current pulse window.
    pulse_window_start: Option<DateTime<Utc>>,
    last_synced_at: Option<DateTime<Utc>>,
    target_reached: bool,
    last_error: Option<String>,
    default_target_minutes: u32,
}

impl FocusTimer {
    pub fn new(default_target_minutes: u32) -> Self {
        Self {
            session: None,
            generation: 0,
            pulse_window_start: None,
            last_synced_at: None,
            target_reached: false,
            last_error: None,
            default_target_minutes,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> FocusState {
        self.session
            .as_ref()
            .map(FocusSession::state)
            .unwrap_or(FocusState::Idle)
    }

    pub fn session(&self) -> Option<&FocusSession> {
        self.session.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.session.is_some() && self.generation == generation
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.session.as_ref().map(|s| s.elapsed_seconds).unwrap_or(0)
    }

    pub fn target_seconds(&self) -> u64 {
        let minutes = self
            .session
            .as_ref()
            .and_then(|s| s.task.target_minutes)
            .unwrap_or(self.default_target_minutes);
        u64::from(minutes) * 60
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        let target = self.target_seconds();
        let mut snap = FocusSnapshot::idle(target);
        snap.last_error = self.last_error.clone();
        snap.last_synced_at = self.last_synced_at;
        if let Some(session) = &self.session {
            snap.state = session.state();
            snap.session_id = Some(session.session_id.clone());
            snap.task = Some(session.task.clone());
            snap.elapsed_seconds = session.elapsed_seconds;
            snap.progress_pct = progress_pct(session.elapsed_seconds, target);
            snap.local_only = session.is_local();
        }
        snap
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a fresh session at zero elapsed. Returns `None` if one is
    /// already active.
    pub fn begin(&mut self, session_id: String, task: FocusTask, now: DateTime<Utc>) -> Option<Event> {
        if self.session.is_some() {
            return None;
        }
        let session = FocusSession::new(session_id, task, now);
        let event = Event::SessionStarted {
            session_id: session.session_id.clone(),
            task_id: session.task.id.clone(),
            local_only: session.is_local(),
            at: now,
        };
        self.install(session, now);
        Some(event)
    }

    /// Take over an existing session (remote handoff or offline restore).
    pub fn adopt(&mut self, session: FocusSession, source: RecoverySource, now: DateTime<Utc>) -> Event {
        let event = Event::SessionRecovered {
            session_id: session.session_id.clone(),
            elapsed_seconds: session.elapsed_seconds,
            running: session.is_running,
            source,
            at: now,
        };
        self.install(session, now);
        self.target_reached = self.elapsed_seconds() >= self.target_seconds();
        event
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let session = self.session.as_mut().filter(|s| s.is_running)?;
        session.is_running = false;
        Some(Event::SessionPaused {
            elapsed_seconds: session.elapsed_seconds,
            at: now,
        })
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let session = self.session.as_mut().filter(|s| !s.is_running)?;
        session.is_running = true;
        // A long pause should not trigger an immediate pulse burst.
        self.pulse_window_start = Some(now);
        Some(Event::SessionResumed {
            elapsed_seconds: session.elapsed_seconds,
            at: now,
        })
    }

    /// Call once per second. Returns `Some(Event::TargetReached)` the first
    /// time elapsed time meets the target.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let target = self.target_seconds();
        let session = self.session.as_mut().filter(|s| s.is_running)?;
        session.elapsed_seconds = session.elapsed_seconds.saturating_add(1);
        if !self.target_reached && target > 0 && session.elapsed_seconds >= target {
            self.target_reached = true;
            return Some(Event::TargetReached {
                task_id: session.task.id.clone(),
                elapsed_seconds: session.elapsed_seconds,
                at: now,
            });
        }
        None
    }

    /// Whether a pulse would be accepted right now.
    pub fn pulse_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        let running = self.session.as_ref().is_some_and(|s| s.is_running);
        running
            && self
                .pulse_window_start
                .map_or(true, |start| now - start >= interval)
    }

    /// Claim the current pulse window. Returns `None` while running is
    /// false or the previous window is still open; nothing is queued.
    pub fn claim_pulse(&mut self, now: DateTime<Utc>, interval: Duration) -> Option<PulseTicket> {
        if !self.pulse_due(now, interval) {
            return None;
        }
        self.pulse_window_start = Some(now);
        let session = self.session.as_ref()?;
        Some(PulseTicket {
            generation: self.generation,
            session_id: session.session_id.clone(),
            elapsed_seconds: session.elapsed_seconds,
            local_only: session.is_local(),
        })
    }

    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
        self.last_error = None;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// End the active session. `completed` selects the event flavour.
    pub fn finish(&mut self, completed: bool, now: DateTime<Utc>) -> Option<(FocusSession, Event)> {
        let session = self.session.take()?;
        self.generation += 1;
        self.pulse_window_start = None;
        self.last_synced_at = None;
        self.target_reached = false;

        let event = if completed {
            Event::SessionCompleted {
                session_id: session.session_id.clone(),
                task_id: session.task.id.clone(),
                milestone_id: session.task.milestone_id.clone(),
                elapsed_seconds: session.elapsed_seconds,
                at: now,
            }
        } else {
            Event::SessionStopped {
                session_id: session.session_id.clone(),
                elapsed_seconds: session.elapsed_seconds,
                at: now,
            }
        };
        Some((session, event))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn install(&mut self, session: FocusSession, now: DateTime<Utc>) {
        self.generation += 1;
        self.session = Some(session);
        self.pulse_window_start = Some(now);
        self.last_synced_at = None;
        self.target_reached = false;
        self.last_error = None;
    }
}
