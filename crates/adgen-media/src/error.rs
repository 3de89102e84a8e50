//! Error types for media operations.

use adgen_models::ModelError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Output integrity check failed for {path}: {reason}")]
    FileIntegrity { path: PathBuf, reason: String },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Invalid render input: {0}")]
    Model(#[from] ModelError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn integrity(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileIntegrity {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// A stage of the render state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "index")]
pub enum RenderStage {
    Normalize,
    Mux,
    /// Caption pass for the segment at this position
    Caption(usize),
}

impl RenderStage {
    /// Stable label for logs and metrics (caption passes share one label).
    pub fn label(&self) -> &'static str {
        match self {
            RenderStage::Normalize => "normalize",
            RenderStage::Mux => "mux",
            RenderStage::Caption(_) => "caption",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStage::Caption(i) => write!(f, "caption[{i}]"),
            other => f.write_str(other.label()),
        }
    }
}

/// A render job halted at `stage`.
#[derive(Debug, Error)]
#[error("render stage {stage} failed: {cause}")]
pub struct RenderStageError {
    pub stage: RenderStage,
    #[source]
    pub cause: MediaError,
}

impl RenderStageError {
    pub fn new(stage: RenderStage, cause: MediaError) -> Self {
        Self { stage, cause }
    }

    /// Whether the stage ran but produced an unusable artifact.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self.cause, MediaError::FileIntegrity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(RenderStage::Normalize.to_string(), "normalize");
        assert_eq!(RenderStage::Caption(2).to_string(), "caption[2]");
        assert_eq!(RenderStage::Caption(2).label(), "caption");
    }

    #[test]
    fn test_stage_error_message() {
        let err = RenderStageError::new(
            RenderStage::Mux,
            MediaError::ffmpeg_failed("exit 1", None, Some(1)),
        );
        assert!(err.to_string().contains("mux"));
        assert!(!err.is_integrity_failure());
    }
}
