//! Session store wire types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{FocusSession, FocusTask};

/// A room's active session as reported by the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    #[serde(rename = "_id")]
    pub id: String,
    /// Elapsed seconds at the last pulse.
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub last_pulse_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub topic_title: Option<String>,
    #[serde(default)]
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl ActiveSession {
    /// Last sign of life: the latest pulse, or the start for a session
    /// that has not pulsed yet.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_pulse_at.or(self.started_at)
    }

    /// Seen within `stale_after` of `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.last_seen().is_some_and(|at| now - at < stale_after)
    }

    /// Provably abandoned: seen, but not within `stale_after`. A payload
    /// without any timestamp is neither fresh nor stale.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.last_seen().is_some_and(|at| now - at >= stale_after)
    }

    /// Local view of this session.
    pub fn to_session(&self, now: DateTime<Utc>) -> FocusSession {
        let task = FocusTask {
            id: self.topic_id.clone().unwrap_or_default(),
            title: self.topic_title.clone().unwrap_or_default(),
            milestone_id: self.milestone_id.clone(),
            target_minutes: None,
        };
        FocusSession {
            session_id: self.id.clone(),
            task,
            is_running: self.is_running,
            elapsed_seconds: self.elapsed_time,
            started_at: self.started_at.unwrap_or(now),
        }
    }
}

/// Session store errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// Unreachable, timed out, or dropped mid-request.
    #[error("Network error: {0}")]
    Network(String),

    /// Another session is already active for this room and user.
    #[error("Session conflict: {0}")]
    Conflict(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_store_payload() {
        let json = r#"{
            "_id": "65f0c2",
            "elapsedTime": 754,
            "isRunning": true,
            "lastPulseAt": "2024-01-01T09:10:00Z",
            "topicId": "topic-3",
            "topicTitle": "Smart pointers",
            "milestoneId": "m2"
        }"#;
        let active: ActiveSession = serde_json::from_str(json).unwrap();
        assert_eq!(active.id, "65f0c2");
        assert_eq!(active.elapsed_time, 754);

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 20, 0).unwrap();
        let session = active.to_session(now);
        assert_eq!(session.task.title, "Smart pointers");
        assert_eq!(session.task.milestone_id.as_deref(), Some("m2"));
        assert_eq!(session.started_at, now);
    }

    #[test]
    fn freshness_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut active: ActiveSession = serde_json::from_str(r#"{"_id":"s"}"#).unwrap();
        assert!(!active.is_fresh(now, Duration::minutes(30)));

        active.last_pulse_at = Some(now - Duration::minutes(10));
        assert!(active.is_fresh(now, Duration::minutes(30)));

        active.last_pulse_at = Some(now - Duration::minutes(40));
        assert!(!active.is_fresh(now, Duration::minutes(30)));
        assert!(active.is_stale(now, Duration::minutes(30)));
    }

    #[test]
    fn unpulsed_session_is_judged_by_start() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut active: ActiveSession = serde_json::from_str(r#"{"_id":"s"}"#).unwrap();
        assert!(!active.is_fresh(now, Duration::minutes(30)));
        assert!(!active.is_stale(now, Duration::minutes(30)));

        active.started_at = Some(now - Duration::seconds(2));
        assert!(active.is_fresh(now, Duration::minutes(30)));

        active.started_at = Some(now - Duration::hours(2));
        assert!(active.is_stale(now, Duration::minutes(30)));

        // a recent pulse outranks an old start
        active.last_pulse_at = Some(now - Duration::minutes(1));
        assert!(active.is_fresh(now, Duration::minutes(30)));
    }
}
