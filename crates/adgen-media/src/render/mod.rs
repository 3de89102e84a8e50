//! Render pipeline: normalize, mux and caption stages driven as a state
//! machine over a [`RenderEngine`](crate::command::RenderEngine).

mod lease;
mod pipeline;
mod plan;

pub use lease::AssetLease;
pub use pipeline::{RenderPipeline, RenderState};
pub use plan::RenderPlan;

use std::path::PathBuf;

use adgen_models::{CaptionStyle, EncodingConfig, RenderProfile, RunId, Segment, TimelineEntry};

/// Smallest stage output accepted as a real video.
pub const DEFAULT_MIN_OUTPUT_BYTES: u64 = 1024;

/// Static render configuration shared by all jobs.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub profile: RenderProfile,
    pub encoding: EncodingConfig,
    pub caption_style: CaptionStyle,
    /// Parent directory for per-job scratch directories
    pub work_dir: PathBuf,
    pub min_output_bytes: u64,
    /// Keep normalized/muxed intermediates next to the final output
    pub keep_intermediates: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            profile: RenderProfile::default(),
            encoding: EncodingConfig::default(),
            caption_style: CaptionStyle::default(),
            work_dir: std::env::temp_dir(),
            min_output_bytes: DEFAULT_MIN_OUTPUT_BYTES,
            keep_intermediates: false,
        }
    }
}

/// One render request.
#[derive(Debug)]
pub struct RenderJob {
    pub run_id: RunId,
    pub timeline: Vec<TimelineEntry>,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    /// Timed segments to burn in; `None` and an empty list both skip captions
    pub captions: Option<Vec<Segment>>,
    /// Measured narration duration in seconds
    pub total_duration: f64,
    /// Source assets, released when the job ends
    pub assets: AssetLease,
}

/// Artifacts of a completed render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub final_path: PathBuf,
    pub normalized_path: Option<PathBuf>,
    pub muxed_path: Option<PathBuf>,
    pub caption_passes: usize,
    /// Probed duration of the final artifact
    pub measured_duration: Option<f64>,
}
