//! The persisted record of one pipeline run.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::asset::AssetBinding;
use crate::run::RunId;
use crate::segment::Segment;

/// Time window of one caption segment in the final ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTiming {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
}

impl From<&Segment> for SegmentTiming {
    fn from(segment: &Segment) -> Self {
        Self {
            index: segment.index,
            start_time: segment.start_time,
            end_time: segment.end_time,
        }
    }
}

/// Intermediate render artifacts, present only when they were kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Intermediates {
    pub normalized_video: Option<PathBuf>,
    pub muxed_video: Option<PathBuf>,
}

/// Manifest written once per successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub prompt: String,
    pub script: String,
    pub segments: Vec<Segment>,
    pub keywords: Vec<String>,
    /// Narration audio file
    pub audio: PathBuf,
    pub media: Vec<AssetBinding>,
    /// Final rendered ad
    pub final_ad: PathBuf,
    /// Measured narration duration in seconds
    pub audio_duration: f64,
    /// Probed duration of the final ad, when probing succeeded
    pub final_duration: Option<f64>,
    pub segment_timings: Vec<SegmentTiming>,
    #[serde(default)]
    pub intermediates: Intermediates,
}

impl AssetManifest {
    /// Number of bindings that fell back to the placeholder.
    pub fn fallback_count(&self) -> usize {
        self.media.iter().filter(|b| b.fallback).count()
    }
}
