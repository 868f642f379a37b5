//! Property-based tests for milestone distribution and date shifts.
//!
//! - End dates strictly increase and finish on the last day of the roadmap
//! - Shares always cover the whole duration
//! - Distribution ignores existing dates, so re-running it is stable
//! - Accepted shifts never break ordering

use chrono::NaiveDate;
use proptest::prelude::*;

use studyroom_core::{can_shift, distribute, redistribute, shift, Milestone};

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn roadmap(weights: &[f64]) -> Vec<Milestone> {
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| Milestone::new(format!("m{i}"), format!("Milestone {i}")).with_weight(*w))
        .collect()
}

fn arb_weights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.1f64..50.0, 1..12)
}

fn strictly_increasing(dates: &[NaiveDate]) -> bool {
    dates.windows(2).all(|w| w[0] < w[1])
}

proptest! {
    #[test]
    fn dates_increase_and_end_on_time(weights in arb_weights(), days in 1i64..400) {
        let milestones = roadmap(&weights);
        let result = distribute(&milestones, days, anchor()).unwrap();
        let dates = result.end_dates();

        prop_assert_eq!(dates.len(), milestones.len());
        prop_assert!(strictly_increasing(&dates));
        prop_assert!(dates[0] > anchor());

        let span = days.max(milestones.len() as i64);
        prop_assert_eq!((*dates.last().unwrap() - anchor()).num_days(), span);
        prop_assert_eq!(result.is_compressed(), days < milestones.len() as i64);
    }

    #[test]
    fn shares_cover_duration(weights in arb_weights(), days in 1i64..400) {
        let result = distribute(&roadmap(&weights), days, anchor()).unwrap();
        prop_assert!(result.shares.iter().all(|s| *s >= 1));
        if !result.is_compressed() {
            prop_assert_eq!(result.shares.iter().sum::<i64>(), days);
        }
    }

    #[test]
    fn distribution_is_stable(weights in arb_weights(), days in 1i64..400) {
        let first = distribute(&roadmap(&weights), days, anchor()).unwrap();
        let second = distribute(&first.milestones, days, anchor()).unwrap();
        prop_assert_eq!(first.end_dates(), second.end_dates());
    }

    #[test]
    fn redistribute_without_pins_matches(weights in arb_weights(), days in 1i64..400) {
        let milestones = roadmap(&weights);
        let plain = distribute(&milestones, days, anchor()).unwrap();
        let regenerated = redistribute(&milestones, days, anchor()).unwrap();
        prop_assert_eq!(plain.end_dates(), regenerated.end_dates());
    }

    #[test]
    fn accepted_shifts_keep_order(
        weights in arb_weights(),
        days in 12i64..200,
        pick in any::<prop::sample::Index>(),
        delta in -10i64..10,
    ) {
        let mut milestones = distribute(&roadmap(&weights), days, anchor()).unwrap().milestones;
        let index = pick.index(milestones.len());
        let before = milestones[index].end_date.unwrap();

        let moved = shift(&mut milestones, index, delta, anchor());
        let dates: Vec<NaiveDate> = milestones.iter().filter_map(|m| m.end_date).collect();

        prop_assert!(strictly_increasing(&dates));
        prop_assert!(dates[0] > anchor());
        if moved {
            prop_assert!(milestones[index].pinned);
            prop_assert_eq!((milestones[index].end_date.unwrap() - before).num_days(), delta);
        } else {
            prop_assert_eq!(milestones[index].end_date.unwrap(), before);
        }
    }

    #[test]
    fn shifted_roadmap_regenerates_in_order(
        weights in prop::collection::vec(0.1f64..50.0, 2..10),
        days in 30i64..200,
        pick in any::<prop::sample::Index>(),
        delta in -5i64..5,
    ) {
        let mut milestones = distribute(&roadmap(&weights), days, anchor()).unwrap().milestones;
        let index = pick.index(milestones.len());
        shift(&mut milestones, index, delta, anchor());

        let regenerated = redistribute(&milestones, days, anchor()).unwrap();
        prop_assert!(strictly_increasing(&regenerated.end_dates()));
    }
}

#[test]
fn test_can_shift_rejects_past_dates() {
    let milestones = distribute(&roadmap(&[1.0, 1.0]), 10, anchor()).unwrap().milestones;
    let today = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
    assert!(!can_shift(&milestones, 0, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), today));
    assert!(can_shift(&milestones, 0, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), today));
}
