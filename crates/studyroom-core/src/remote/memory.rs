//! In-process session store.
//!
//! Enforces the same one-active-session-per-room rule as the real service.
//! Useful for demos and for exercising the timer without a server; it can
//! also be switched "offline" to simulate connectivity loss.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{ActiveSession, RemoteError};
use super::SessionStore;
use crate::clock::Clock;
use crate::timer::FocusTask;

#[derive(Default)]
struct Rooms {
    active: HashMap<String, ActiveSession>,
    next_id: u64,
}

pub struct InMemorySessionStore {
    clock: Arc<dyn Clock>,
    rooms: Mutex<Rooms>,
    offline: AtomicBool,
    pulses: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rooms: Mutex::new(Rooms::default()),
            offline: AtomicBool::new(false),
            pulses: AtomicU64::new(0),
        }
    }

    /// While offline every call fails with [`RemoteError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Accepted pulses so far.
    pub fn pulse_count(&self) -> u64 {
        self.pulses.load(Ordering::SeqCst)
    }

    /// Seed an active session, e.g. one started on another device.
    pub fn insert_active(&self, room_id: &str, session: ActiveSession) {
        self.rooms().active.insert(room_id.to_string(), session);
    }

    pub fn active_now(&self, room_id: &str) -> Option<ActiveSession> {
        self.rooms().active.get(room_id).cloned()
    }

    fn rooms(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::Network("session store unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn start(&self, room_id: &str, task: &FocusTask) -> Result<String, RemoteError> {
        self.check_online()?;
        let now = self.now();
        let mut rooms = self.rooms();
        if let Some(existing) = rooms.active.get(room_id) {
            return Err(RemoteError::Conflict(format!(
                "session {} is already active",
                existing.id
            )));
        }
        rooms.next_id += 1;
        let id = format!("session-{}", rooms.next_id);
        rooms.active.insert(
            room_id.to_string(),
            ActiveSession {
                id: id.clone(),
                elapsed_time: 0,
                is_running: true,
                last_pulse_at: Some(now),
                topic_id: Some(task.id.clone()),
                topic_title: Some(task.title.clone()),
                milestone_id: task.milestone_id.clone(),
                started_at: Some(now),
            },
        );
        Ok(id)
    }

    async fn pulse(&self, room_id: &str, session_id: &str, elapsed_seconds: u64) -> Result<(), RemoteError> {
        self.check_online()?;
        let now = self.now();
        let mut rooms = self.rooms();
        match rooms.active.get_mut(room_id) {
            Some(session) if session.id == session_id => {
                session.elapsed_time = elapsed_seconds;
                session.last_pulse_at = Some(now);
                session.is_running = true;
                self.pulses.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(RemoteError::Rejected {
                status: 404,
                message: format!("no active session {session_id}"),
            }),
        }
    }

    async fn end(&self, room_id: &str, session_id: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut rooms = self.rooms();
        match rooms.active.get(room_id) {
            Some(session) if session.id == session_id => {
                rooms.active.remove(room_id);
                Ok(())
            }
            _ => Err(RemoteError::Rejected {
                status: 404,
                message: format!("no active session {session_id}"),
            }),
        }
    }

    async fn active(&self, room_id: &str) -> Result<Option<ActiveSession>, RemoteError> {
        self.check_online()?;
        Ok(self.active_now(room_id))
    }
}
