//! Timeline planning.
//!
//! The planner divides the measured narration duration into equal shares,
//! one per visual asset, in asset order. Shares ignore each asset's native
//! length: a short clip is looped or a long clip trimmed by the renderer to
//! fill its slot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::asset::VisualAsset;
use crate::error::{ModelError, ModelResult};

/// A visual asset placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub asset: VisualAsset,
    /// Offset (seconds) where this asset starts in the final video
    pub allocated_start: f64,
    /// Offset (seconds) where this asset ends; equals the next entry's start
    pub allocated_end: f64,
}

impl TimelineEntry {
    /// Length of the slot in seconds.
    pub fn duration(&self) -> f64 {
        self.allocated_end - self.allocated_start
    }
}

/// Split `[0, total]` into `count` contiguous, equal-length intervals.
///
/// Interval `i` is `[i * per, (i + 1) * per)` where `per = total / count`.
/// Adjacent intervals share the exact same boundary value and the last end
/// is clamped to `total` to absorb floating-point drift. Returns an empty
/// vector when `count` is zero.
pub fn equal_share_intervals(total: f64, count: usize) -> Vec<(f64, f64)> {
    if count == 0 {
        return Vec::new();
    }

    let per = total / count as f64;
    let boundary = |i: usize| if i == count { total } else { i as f64 * per };

    (0..count).map(|i| (boundary(i), boundary(i + 1))).collect()
}

/// Plan the timeline for `assets` over `total_duration` seconds.
pub fn plan_timeline(total_duration: f64, assets: &[VisualAsset]) -> ModelResult<Vec<TimelineEntry>> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(ModelError::InvalidDuration(total_duration));
    }
    if assets.is_empty() {
        return Err(ModelError::NoAssets);
    }

    Ok(equal_share_intervals(total_duration, assets.len())
        .into_iter()
        .zip(assets)
        .map(|((start, end), asset)| TimelineEntry {
            asset: asset.clone(),
            allocated_start: start,
            allocated_end: end,
        })
        .collect())
}
