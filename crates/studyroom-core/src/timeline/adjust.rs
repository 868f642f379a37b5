//! Manual single-milestone date adjustment.
//!
//! The UI shows +1/-1 day buttons per milestone and disables them when the
//! move would break ordering, so a refused shift is a silent no-op.

use chrono::{Duration, NaiveDate};

use super::milestone::Milestone;

/// Whether milestone `index` may move to `proposed`.
///
/// The date must not be in the past, must be strictly after the previous
/// enabled milestone (or after `today` for the first one) and strictly
/// before the next enabled milestone, if any.
pub fn can_shift(milestones: &[Milestone], index: usize, proposed: NaiveDate, today: NaiveDate) -> bool {
    let Some(target) = milestones.get(index) else {
        return false;
    };
    if target.end_date.is_none() || proposed < today {
        return false;
    }

    let lower = milestones[..index]
        .iter()
        .rev()
        .filter(|m| m.enabled)
        .find_map(|m| m.end_date)
        .unwrap_or(today);
    if proposed <= lower {
        return false;
    }

    let upper = milestones[index + 1..]
        .iter()
        .filter(|m| m.enabled)
        .find_map(|m| m.end_date);
    match upper {
        Some(next) => proposed < next,
        None => true,
    }
}

/// Move milestone `index` by `delta_days` if [`can_shift`] allows it.
///
/// A moved milestone is marked pinned so a later regeneration keeps it.
/// Returns whether anything changed.
pub fn shift(milestones: &mut [Milestone], index: usize, delta_days: i64, today: NaiveDate) -> bool {
    if delta_days == 0 {
        return false;
    }
    let Some(current) = milestones.get(index).and_then(|m| m.end_date) else {
        return false;
    };
    let Some(proposed) = Duration::try_days(delta_days).and_then(|delta| current.checked_add_signed(delta)) else {
        return false;
    };
    if !can_shift(milestones, index, proposed, today) {
        return false;
    }

    let milestone = &mut milestones[index];
    milestone.end_date = Some(proposed);
    milestone.pinned = true;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roadmap() -> Vec<Milestone> {
        vec![
            Milestone::new("m1", "One").with_end_date(date(2024, 1, 11)),
            Milestone::new("m2", "Two").with_end_date(date(2024, 1, 31)),
            Milestone::new("m3", "Three").with_end_date(date(2024, 2, 10)),
        ]
    }

    #[test]
    fn allows_moves_between_neighbours() {
        let today = date(2024, 1, 1);
        let milestones = roadmap();
        assert!(can_shift(&milestones, 1, date(2024, 1, 12), today));
        assert!(can_shift(&milestones, 1, date(2024, 2, 9), today));
        assert!(!can_shift(&milestones, 1, date(2024, 1, 11), today));
        assert!(!can_shift(&milestones, 1, date(2024, 2, 10), today));
    }

    #[test]
    fn first_milestone_must_stay_after_today() {
        let today = date(2024, 1, 5);
        let milestones = roadmap();
        assert!(!can_shift(&milestones, 0, today, today));
        assert!(can_shift(&milestones, 0, date(2024, 1, 6), today));
    }

    #[test]
    fn last_milestone_is_unbounded_above() {
        let milestones = roadmap();
        assert!(can_shift(&milestones, 2, date(2025, 6, 1), date(2024, 1, 1)));
    }

    #[test]
    fn never_in_the_past() {
        let milestones = roadmap();
        // after its neighbour but before today
        assert!(!can_shift(&milestones, 2, date(2024, 2, 5), date(2024, 2, 6)));
    }

    #[test]
    fn disabled_neighbours_are_skipped() {
        let mut milestones = roadmap();
        milestones[1].enabled = false;
        assert!(can_shift(&milestones, 2, date(2024, 1, 20), date(2024, 1, 1)));
        assert!(can_shift(&milestones, 0, date(2024, 2, 1), date(2024, 1, 1)));
    }

    #[test]
    fn out_of_range_or_undated_is_refused() {
        let mut milestones = roadmap();
        assert!(!can_shift(&milestones, 7, date(2024, 1, 20), date(2024, 1, 1)));
        milestones[1].end_date = None;
        assert!(!can_shift(&milestones, 1, date(2024, 1, 20), date(2024, 1, 1)));
    }

    #[test]
    fn shift_applies_and_pins() {
        let mut milestones = roadmap();
        assert!(shift(&mut milestones, 1, 1, date(2024, 1, 1)));
        assert_eq!(milestones[1].end_date, Some(date(2024, 2, 1)));
        assert!(milestones[1].pinned);
    }

    #[test]
    fn extreme_delta_is_refused() {
        let mut milestones = roadmap();
        let before = milestones.clone();
        let today = date(2024, 1, 1);
        assert!(!shift(&mut milestones, 2, i64::MAX, today));
        assert!(!shift(&mut milestones, 2, i64::MIN, today));
        // a valid span that overflows the calendar
        assert!(!shift(&mut milestones, 2, 200_000_000, today));
        assert_eq!(milestones, before);
    }

    #[test]
    fn refused_shift_is_noop() {
        let mut milestones = roadmap();
        milestones[1].end_date = Some(date(2024, 1, 12));
        let before = milestones.clone();
        assert!(!shift(&mut milestones, 1, -1, date(2024, 1, 1)));
        assert_eq!(milestones, before);
    }
}
