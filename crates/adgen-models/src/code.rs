//! Stable, machine-readable error codes exposed at the HTTP boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error category reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingPrompt,
    VideoDownloadError,
    VideoEditingError,
    ScriptGenerationError,
    AudioGenerationError,
    KeywordExtractionError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingPrompt => "MISSING_PROMPT",
            ErrorCode::VideoDownloadError => "VIDEO_DOWNLOAD_ERROR",
            ErrorCode::VideoEditingError => "VIDEO_EDITING_ERROR",
            ErrorCode::ScriptGenerationError => "SCRIPT_GENERATION_ERROR",
            ErrorCode::AudioGenerationError => "AUDIO_GENERATION_ERROR",
            ErrorCode::KeywordExtractionError => "KEYWORD_EXTRACTION_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Whether the caller can fix the request (4xx) rather than retry later.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorCode::MissingPrompt)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
