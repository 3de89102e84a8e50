//! Shared data models for the AdGen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Script segments and the sentence segmenter
//! - Visual assets and their bindings
//! - Timeline planning (equal-share allocation)
//! - Encoding, render profile and caption configuration
//! - Narration voice parameters
//! - The persisted run manifest and stable error codes

pub mod asset;
pub mod code;
pub mod encoding;
pub mod error;
pub mod manifest;
pub mod run;
pub mod segment;
pub mod timeline;
pub mod voice;

// Re-export common types
pub use asset::{AssetBinding, AssetKind, VisualAsset, FALLBACK_SOURCE};
pub use code::ErrorCode;
pub use encoding::{CaptionStyle, EncodingConfig, RenderProfile};
pub use error::{ModelError, ModelResult};
pub use manifest::{AssetManifest, Intermediates, SegmentTiming};
pub use run::RunId;
pub use segment::{assign_segment_timings, segment_script, split_sentences, Segment};
pub use timeline::{equal_share_intervals, plan_timeline, TimelineEntry};
pub use voice::VoiceParams;
