//! On-device persistence port for the focus timer.
//!
//! The timer writes a small JSON envelope per room. It is a fast-path cache
//! and offline fallback, never the source of truth once the session store
//! has been consulted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::timer::FocusSession;

/// Key-value persistence used by the timer.
pub trait LocalStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn clear(&self, key: &str) -> Result<(), StorageError>;
}

/// `focusTimer_<room_id>`
pub fn focus_key(room_id: &str) -> String {
    format!("focusTimer_{room_id}")
}

/// What gets written under [`focus_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSnapshot {
    pub session: FocusSession,
    pub saved_at: DateTime<Utc>,
}

impl LocalSnapshot {
    pub fn new(session: FocusSession, saved_at: DateTime<Utc>) -> Self {
        Self { session, saved_at }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.saved_at > ttl
    }

    pub fn write(&self, store: &dyn LocalStore, key: &str) -> Result<(), StorageError> {
        let json = serde_json::to_string(self).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        store.save(key, &json)
    }

    /// Read and decode a snapshot. Undecodable entries are cleared and
    /// reported as absent.
    pub fn read(store: &dyn LocalStore, key: &str) -> Result<Option<Self>, StorageError> {
        let Some(raw) = store.load(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable focus snapshot");
                store.clear(key)?;
                Ok(None)
            }
        }
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryStore {
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn clear(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::FocusTask;
    use chrono::TimeZone;

    fn snapshot(saved_at: DateTime<Utc>) -> LocalSnapshot {
        let session = FocusSession::new("s1", FocusTask::new("t1", "Closures"), saved_at);
        LocalSnapshot::new(session, saved_at)
    }

    #[test]
    fn key_format() {
        assert_eq!(focus_key("room-42"), "focusTimer_room-42");
    }

    #[test]
    fn write_then_read() {
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        snapshot(at).write(&store, "k").unwrap();
        let back = LocalSnapshot::read(&store, "k").unwrap().unwrap();
        assert_eq!(back, snapshot(at));
    }

    #[test]
    fn expiry_after_ttl() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let snap = snapshot(at);
        assert!(!snap.is_expired(at + Duration::hours(23), Duration::hours(24)));
        assert!(snap.is_expired(at + Duration::hours(25), Duration::hours(24)));
    }

    #[test]
    fn corrupt_entry_is_cleared() {
        let store = MemoryStore::new();
        store.save("k", "{not json").unwrap();
        assert!(LocalSnapshot::read(&store, "k").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_removes_entry() {
        let store = MemoryStore::new();
        store.save("k", "v").unwrap();
        store.clear("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }
}
