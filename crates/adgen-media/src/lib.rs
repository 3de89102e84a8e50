//! FFmpeg CLI wrapper and ad render pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A typed filter-graph builder with FFmpeg escaping
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe duration measurement
//! - The normalize, mux and caption render state machine

pub mod captions;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod render;

pub use captions::sanitize_caption;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, RenderEngine};
pub use error::{MediaError, MediaResult, RenderStage, RenderStageError};
pub use filters::{Filter, FilterChain, FilterGraph};
pub use probe::{probe_duration, probe_media, FfprobeProber, MediaInfo, MediaProber};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use render::{
    AssetLease, RenderJob, RenderOutcome, RenderPipeline, RenderPlan, RenderSettings, RenderState,
};
