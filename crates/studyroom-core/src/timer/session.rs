use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::epoch_ms;

/// Prefix of session ids minted locally when the session store was
/// unreachable at start.
pub const LOCAL_SESSION_PREFIX: &str = "local_";

/// Reference to the topic or milestone being studied.
///
/// The timer only needs identity and display text; task data lives with the
/// roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub milestone_id: Option<String>,
    /// Planned focus length. Falls back to the configured default.
    #[serde(default)]
    pub target_minutes: Option<u32>,
}

impl FocusTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            milestone_id: None,
            target_minutes: None,
        }
    }

    pub fn with_milestone(mut self, milestone_id: impl Into<String>) -> Self {
        self.milestone_id = Some(milestone_id.into());
        self
    }

    pub fn with_target_minutes(mut self, minutes: u32) -> Self {
        self.target_minutes = Some(minutes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusState {
    Idle,
    Running,
    Paused,
}

/// An active focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub session_id: String,
    pub task: FocusTask,
    pub is_running: bool,
    pub elapsed_seconds: u64,
    pub started_at: DateTime<Utc>,
}

impl FocusSession {
    pub fn new(session_id: impl Into<String>, task: FocusTask, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            task,
            is_running: true,
            elapsed_seconds: 0,
            started_at,
        }
    }

    /// Whether this session only exists on this device.
    pub fn is_local(&self) -> bool {
        self.session_id.starts_with(LOCAL_SESSION_PREFIX)
    }

    pub fn state(&self) -> FocusState {
        if self.is_running {
            FocusState::Running
        } else {
            FocusState::Paused
        }
    }
}

/// `local_<epoch millis>`
pub fn local_session_id(now: DateTime<Utc>) -> String {
    format!("{LOCAL_SESSION_PREFIX}{}", epoch_ms(now))
}

/// Read-only view of the timer handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub state: FocusState,
    pub session_id: Option<String>,
    pub task: Option<FocusTask>,
    pub elapsed_seconds: u64,
    pub target_seconds: u64,
    /// 0.0 .. 100.0, presentation only.
    pub progress_pct: f64,
    pub local_only: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl FocusSnapshot {
    pub fn idle(target_seconds: u64) -> Self {
        Self {
            state: FocusState::Idle,
            session_id: None,
            task: None,
            elapsed_seconds: 0,
            target_seconds,
            progress_pct: 0.0,
            local_only: false,
            last_synced_at: None,
            last_error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != FocusState::Idle
    }
}

/// Elapsed share of the target, clamped to 100.
pub fn progress_pct(elapsed_seconds: u64, target_seconds: u64) -> f64 {
    if target_seconds == 0 {
        return 0.0;
    }
    (elapsed_seconds as f64 / target_seconds as f64 * 100.0).min(100.0)
}
