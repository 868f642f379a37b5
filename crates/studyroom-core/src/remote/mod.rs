//! Room session store port.
//!
//! The session store owns the "one active focus session per room and user"
//! rule. The timer talks to it through [`SessionStore`] and treats every
//! failure as recoverable except an explicit conflict on start.

pub mod http;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::timer::FocusTask;

pub use http::HttpSessionStore;
pub use memory::InMemorySessionStore;
pub use types::{ActiveSession, RemoteError};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open a session for `task`, returning the store-issued id.
    async fn start(&self, room_id: &str, task: &FocusTask) -> Result<String, RemoteError>;

    /// Report progress for a running session.
    async fn pulse(&self, room_id: &str, session_id: &str, elapsed_seconds: u64) -> Result<(), RemoteError>;

    async fn end(&self, room_id: &str, session_id: &str) -> Result<(), RemoteError>;

    /// The room's active session for the current user, if any.
    async fn active(&self, room_id: &str) -> Result<Option<ActiveSession>, RemoteError>;
}
