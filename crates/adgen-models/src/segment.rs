//! Script segments and the sentence segmenter.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{ModelError, ModelResult};
use crate::timeline::equal_share_intervals;

/// A sentence-level slice of the narration script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub index: usize,
    pub text: String,
    /// Window start in seconds (0.0 until timed)
    pub start_time: f64,
    /// Window end in seconds (0.0 until timed)
    pub end_time: f64,
}

impl Segment {
    /// Create a segment that has not been assigned a time window yet.
    pub fn untimed(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            start_time: 0.0,
            end_time: 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

fn sentence_terminators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence regex"))
}

/// Split narration text into trimmed, non-empty sentences in source order.
///
/// # Errors
/// Returns [`ModelError::EmptyScript`] when no sentence text remains.
pub fn split_sentences(text: &str) -> ModelResult<Vec<String>> {
    let sentences: Vec<String> = sentence_terminators()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if sentences.is_empty() {
        return Err(ModelError::EmptyScript);
    }
    Ok(sentences)
}

/// Segment a script into untimed [`Segment`]s.
pub fn segment_script(text: &str) -> ModelResult<Vec<Segment>> {
    Ok(split_sentences(text)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment::untimed(index, text))
        .collect())
}

/// Assign contiguous equal-share windows covering `[0, total]` to segments.
pub fn assign_segment_timings(segments: &mut [Segment], total: f64) -> ModelResult<()> {
    if !total.is_finite() || total <= 0.0 {
        return Err(ModelError::InvalidDuration(total));
    }
    if segments.is_empty() {
        return Err(ModelError::EmptyScript);
    }

    let windows = equal_share_intervals(total, segments.len());
    for (segment, (start, end)) in segments.iter_mut().zip(windows) {
        segment.start_time = start;
        segment.end_time = end;
    }
    Ok(())
}
