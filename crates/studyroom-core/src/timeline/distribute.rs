//! Proportional end-date distribution across milestones.
//!
//! ## Algorithm
//!
//! ```text
//! share_i = round(total_days * weight_i / total_weight)
//! share_last = total_days - sum(share_0 .. share_{n-2})
//! any share < 1 borrows one day at a time from the largest share
//! end_i = anchor + share_0 + .. + share_i
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::milestone::Milestone;
use crate::error::TimelineError;

/// Non-fatal conditions the caller may want to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionWarning {
    /// Fewer days than milestones; every milestone got exactly one day.
    Compressed {
        requested_days: i64,
        milestone_count: usize,
    },
    /// A manually pinned date no longer fits and was recomputed.
    PinDropped { id: String },
}

/// Result of a distribution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub milestones: Vec<Milestone>,
    /// Days assigned to each milestone, in list order.
    pub shares: Vec<i64>,
    #[serde(default)]
    pub warnings: Vec<DistributionWarning>,
}

impl Distribution {
    pub fn end_dates(&self) -> Vec<NaiveDate> {
        self.milestones.iter().filter_map(|m| m.end_date).collect()
    }

    pub fn is_compressed(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, DistributionWarning::Compressed { .. }))
    }
}

/// Assign an end date to every milestone, proportional to its weight.
///
/// The first milestone starts at `anchor` and the last ends at
/// `anchor + total_days` (or `anchor + len` when compressed).
///
/// # Errors
///
/// Returns [`TimelineError::InvalidInput`] for an empty list, a
/// non-positive duration, an end date outside the supported calendar, or
/// weights that are negative, non-finite or all zero.
pub fn distribute(
    milestones: &[Milestone],
    total_days: i64,
    anchor: NaiveDate,
) -> Result<Distribution, TimelineError> {
    let weights = validated_weights(milestones, total_days)?;
    // Bounds the share arithmetic below to the calendar's range.
    add_days(anchor, total_days)?;
    let (shares, warning) = day_shares(&weights, total_days);

    let mut out = milestones.to_vec();
    let mut cumulative = 0i64;
    for (milestone, share) in out.iter_mut().zip(&shares) {
        cumulative += share;
        milestone.end_date = Some(add_days(anchor, cumulative)?);
    }

    Ok(Distribution {
        milestones: out,
        shares,
        warnings: warning.into_iter().collect(),
    })
}

/// Regenerate the timeline while keeping manual edits.
///
/// Pinned milestones keep their `end_date`; the milestones between two pins
/// are spread over the gap between them. A pin that is out of order or
/// leaves too few days for its neighbours is dropped (and reported) rather
/// than failing the whole run. Without pins this is [`distribute`].
///
/// # Errors
///
/// Same input validation as [`distribute`].
pub fn redistribute(
    milestones: &[Milestone],
    total_days: i64,
    anchor: NaiveDate,
) -> Result<Distribution, TimelineError> {
    let weights = validated_weights(milestones, total_days)?;
    let count = milestones.len();
    let final_end = add_days(anchor, total_days)?;

    let mut warnings = Vec::new();
    let mut kept_pins: Vec<(usize, NaiveDate)> = Vec::new();
    let mut prev_index: Option<usize> = None;
    let mut prev_date = anchor;

    for (index, milestone) in milestones.iter().enumerate() {
        let Some(date) = milestone.end_date.filter(|_| milestone.pinned) else {
            continue;
        };
        let needed_before = index - prev_index.map_or(0, |p| p + 1) + 1;
        let days_before = (date - prev_date).num_days();
        let needed_after = (count - 1 - index) as i64;
        let days_after = (final_end - date).num_days();
        let is_last = index + 1 == count;

        if days_before >= needed_before as i64 && (is_last || days_after >= needed_after) {
            kept_pins.push((index, date));
            prev_index = Some(index);
            prev_date = date;
        } else {
            tracing::debug!(id = %milestone.id, %date, "dropping pinned date that no longer fits");
            warnings.push(DistributionWarning::PinDropped {
                id: milestone.id.clone(),
            });
        }
    }

    let mut out = milestones.to_vec();
    let mut shares = Vec::with_capacity(count);
    let mut segment_start = 0usize;
    let mut segment_anchor = anchor;

    for &(pin_index, pin_date) in &kept_pins {
        let days = (pin_date - segment_anchor).num_days();
        let (segment, _) = day_shares(&weights[segment_start..=pin_index], days);
        shares.extend(segment);
        segment_start = pin_index + 1;
        segment_anchor = pin_date;
    }
    if segment_start < count {
        let days = (final_end - segment_anchor).num_days();
        let (segment, warning) = day_shares(&weights[segment_start..], days);
        if let Some(DistributionWarning::Compressed { .. }) = warning {
            warnings.push(DistributionWarning::Compressed {
                requested_days: total_days,
                milestone_count: count,
            });
        }
        shares.extend(segment);
    }

    let mut cumulative = 0i64;
    for (index, (milestone, share)) in out.iter_mut().zip(&shares).enumerate() {
        cumulative += share;
        milestone.end_date = Some(add_days(anchor, cumulative)?);
        milestone.pinned = kept_pins.iter().any(|(i, _)| *i == index);
    }

    Ok(Distribution {
        milestones: out,
        shares,
        warnings,
    })
}

fn validated_weights(milestones: &[Milestone], total_days: i64) -> Result<Vec<f64>, TimelineError> {
    if milestones.is_empty() {
        return Err(TimelineError::InvalidInput("no milestones to distribute".into()));
    }
    if total_days <= 0 {
        return Err(TimelineError::InvalidInput(format!(
            "total days must be positive, got {total_days}"
        )));
    }

    let weights: Vec<f64> = milestones.iter().map(Milestone::effective_weight).collect();
    if let Some((m, w)) = milestones
        .iter()
        .zip(&weights)
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(TimelineError::InvalidInput(format!(
            "milestone '{}' has invalid weight {w}",
            m.id
        )));
    }
    // Scale by the largest weight so the sum stays finite for huge weights.
    let max = weights.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return Err(TimelineError::InvalidInput("total weight is zero".into()));
    }
    Ok(weights.into_iter().map(|w| w / max).collect())
}

/// Split `total_days` into per-weight shares that sum to exactly
/// `total_days`, each at least one day.
///
/// With fewer days than weights every share is 1 and a `Compressed`
/// warning is returned.
pub(crate) fn day_shares(weights: &[f64], total_days: i64) -> (Vec<i64>, Option<DistributionWarning>) {
    let count = weights.len();
    if count == 0 {
        return (Vec::new(), None);
    }
    if total_days < count as i64 {
        return (
            vec![1; count],
            Some(DistributionWarning::Compressed {
                requested_days: total_days,
                milestone_count: count,
            }),
        );
    }

    let total_weight: f64 = weights.iter().sum();
    let mut shares: Vec<i64> = if total_weight > 0.0 {
        weights
            .iter()
            .map(|w| (total_days as f64 * w / total_weight).round() as i64)
            .collect()
    } else {
        vec![0; count]
    };

    let head: i64 = shares[..count - 1].iter().sum();
    shares[count - 1] = total_days - head;

    // Sum is total_days >= count, so a donor above 1 always exists while
    // any share is below 1.
    for i in 0..count {
        while shares[i] < 1 {
            let Some(donor) = largest_donor(&shares) else {
                break;
            };
            shares[donor] -= 1;
            shares[i] += 1;
        }
    }

    (shares, None)
}

/// Index of the largest share above 1, first one on ties.
fn largest_donor(shares: &[i64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &share) in shares.iter().enumerate() {
        if share > 1 && best.map_or(true, |b| share > shares[b]) {
            best = Some(i);
        }
    }
    best
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, TimelineError> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| TimelineError::InvalidInput(format!("{date} + {days} days is out of range")))
}
