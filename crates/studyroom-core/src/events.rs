use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a recovered session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverySource {
    /// Adopted from the session store (another tab or device).
    Remote,
    /// Restored from the on-device snapshot while offline.
    Local,
}

/// Every focus-session transition produces an Event.
/// The view layer renders snapshots; events are for toasts and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: String,
        task_id: String,
        local_only: bool,
        at: DateTime<Utc>,
    },
    SessionPaused {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    SessionStopped {
        session_id: String,
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    /// Stopped because the task is done.
    SessionCompleted {
        session_id: String,
        task_id: String,
        milestone_id: Option<String>,
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    SessionRecovered {
        session_id: String,
        elapsed_seconds: u64,
        running: bool,
        source: RecoverySource,
        at: DateTime<Utc>,
    },
    /// Elapsed time crossed the task's target. Emitted once per session.
    TargetReached {
        task_id: String,
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    /// Progress was written locally and, unless `synced` is false,
    /// acknowledged by the session store.
    Pulsed {
        session_id: String,
        elapsed_seconds: u64,
        synced: bool,
        at: DateTime<Utc>,
    },
}
