use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::milestone::Milestone;

/// Where "today" falls on a distributed roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineProgress {
    /// Index of the first milestone due today or later.
    pub current_index: Option<usize>,
    pub current_id: Option<String>,
    /// Days until the current milestone is due (0 = due today).
    pub days_until_due: Option<i64>,
    /// Milestones whose end date is already behind us.
    pub past_due: usize,
    /// 0.0 .. 100.0 of the roadmap's calendar span elapsed.
    pub elapsed_pct: f64,
}

pub fn timeline_progress(milestones: &[Milestone], anchor: NaiveDate, today: NaiveDate) -> TimelineProgress {
    let current_index = milestones
        .iter()
        .position(|m| m.end_date.is_some_and(|d| d >= today));
    let current = current_index.and_then(|i| milestones.get(i));

    let past_due = milestones
        .iter()
        .filter(|m| m.end_date.is_some_and(|d| d < today))
        .count();

    let span = milestones
        .iter()
        .filter_map(|m| m.end_date)
        .max()
        .map(|end| (end - anchor).num_days())
        .unwrap_or(0);
    let elapsed_pct = if span <= 0 {
        0.0
    } else {
        let elapsed = (today - anchor).num_days().clamp(0, span);
        elapsed as f64 / span as f64 * 100.0
    };

    TimelineProgress {
        current_index,
        current_id: current.map(|m| m.id.clone()),
        days_until_due: current.and_then(|m| m.end_date).map(|d| (d - today).num_days()),
        past_due,
        elapsed_pct,
    }
}
