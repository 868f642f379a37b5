//! Core error types for studyroom-core.
//!
//! Each subsystem owns a small thiserror enum; [`CoreError`] wraps them for
//! callers (the CLI) that just want to bubble everything up with `?`.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

/// Core error type for studyroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timeline distribution errors
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    /// Focus timer errors
    #[error("Focus session error: {0}")]
    Focus(#[from] FocusError),

    /// Local storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote session store errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Timeline distributor errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// Empty milestone list, non-positive duration or unusable weights.
    /// Callers should fall back to a one-milestone roadmap.
    #[error("Invalid timeline input: {0}")]
    InvalidInput(String),
}

/// Errors surfaced by [`crate::timer::FocusController::start_session`].
///
/// Every other timer operation degrades silently and reports through the
/// snapshot instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FocusError {
    /// A session is already running or paused in this controller.
    #[error("A focus session is already active ({session_id})")]
    AlreadyActive { session_id: String },

    /// The remote store refused because another session is active.
    #[error("Another focus session is already active in this room: {0}")]
    Conflict(String),

    /// The remote store explicitly rejected the request.
    #[error("Session store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Local key-value store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Snapshot could not be encoded or decoded
    #[error("Corrupt snapshot for key '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Store mutex was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
