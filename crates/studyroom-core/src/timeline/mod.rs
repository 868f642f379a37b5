//! Milestone timeline distribution.
//!
//! This module provides:
//! - Proportional end-date distribution over a roadmap duration
//! - Regeneration that keeps manually pinned dates
//! - Neighbour-bounded single-milestone date shifts
//! - Calendar progress for rendering

mod adjust;
mod distribute;
mod milestone;
mod progress;

pub use adjust::{can_shift, shift};
pub use distribute::{distribute, redistribute, Distribution, DistributionWarning};
pub use milestone::{fallback_roadmap, Milestone};
pub use progress::{timeline_progress, TimelineProgress};
