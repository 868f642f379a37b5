//! # Studyroom Core Library
//!
//! This library provides the core logic behind a study room: planning a
//! learning roadmap over a fixed number of days and timing focus sessions
//! against it. The `studyroom-cli` binary is a thin layer over the same
//! library.
//!
//! ## Architecture
//!
//! - **Timeline**: Proportional milestone end-date distribution, pinned-date
//!   regeneration and neighbour-bounded date shifts
//! - **Timer**: A focus session state machine driven by a one-second tick,
//!   synchronised with a room session store through periodic pulses
//! - **Remote**: The session store port plus HTTP and in-process adapters
//! - **Storage**: On-device session snapshots (SQLite or memory) and
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`distribute`]: Assign end dates to milestones
//! - [`FocusController`]: One room's focus session
//! - [`SessionStore`]: Port to the room session store
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod remote;
pub mod storage;
pub mod timeline;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use error::{ConfigError, CoreError, FocusError, StorageError, TimelineError};
pub use events::{Event, RecoverySource};
pub use remote::{ActiveSession, HttpSessionStore, InMemorySessionStore, RemoteError, SessionStore};
pub use storage::{Config, LocalSnapshot, LocalStore, MemoryStore, SqliteStore};
pub use timeline::{
    can_shift, distribute, fallback_roadmap, redistribute, shift, timeline_progress, Distribution,
    DistributionWarning, Milestone, TimelineProgress,
};
pub use timer::{
    FocusController, FocusDriver, FocusSettings, FocusSnapshot, FocusState, FocusTask, FocusTimer,
};
