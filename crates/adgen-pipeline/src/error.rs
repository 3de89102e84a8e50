//! Pipeline error types.

use std::fmt;

use adgen_media::{MediaError, RenderStageError};
use adgen_models::{ErrorCode, ModelError};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Generation step whose upstream service failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStage {
    Script,
    Audio,
    Keywords,
}

impl UpstreamStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamStage::Script => "script",
            UpstreamStage::Audio => "audio",
            UpstreamStage::Keywords => "keywords",
        }
    }
}

impl fmt::Display for UpstreamStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("{stage} generation failed: {message}")]
    UpstreamGeneration {
        stage: UpstreamStage,
        message: String,
    },

    #[error("Media resolution failed: {0}")]
    MediaResolution(String),

    #[error("Render failed: {0}")]
    Render(#[from] RenderStageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn upstream(stage: UpstreamStage, msg: impl fmt::Display) -> Self {
        Self::UpstreamGeneration {
            stage,
            message: msg.to_string(),
        }
    }

    pub fn script(msg: impl fmt::Display) -> Self {
        Self::upstream(UpstreamStage::Script, msg)
    }

    pub fn audio(msg: impl fmt::Display) -> Self {
        Self::upstream(UpstreamStage::Audio, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable code reported to API callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::InputValidation(_) => ErrorCode::MissingPrompt,
            PipelineError::UpstreamGeneration { stage, .. } => match stage {
                UpstreamStage::Script => ErrorCode::ScriptGenerationError,
                UpstreamStage::Audio => ErrorCode::AudioGenerationError,
                UpstreamStage::Keywords => ErrorCode::KeywordExtractionError,
            },
            PipelineError::MediaResolution(_) => ErrorCode::VideoDownloadError,
            PipelineError::Render(_) => ErrorCode::VideoEditingError,
            PipelineError::Media(MediaError::FileIntegrity { .. }) => ErrorCode::VideoEditingError,
            _ => ErrorCode::UnknownError,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.code().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_media::RenderStage;

    #[test]
    fn test_code_mapping() {
        assert_eq!(PipelineError::input("empty").code(), ErrorCode::MissingPrompt);
        assert_eq!(PipelineError::script("boom").code(), ErrorCode::ScriptGenerationError);
        assert_eq!(PipelineError::audio("boom").code(), ErrorCode::AudioGenerationError);
        assert_eq!(
            PipelineError::upstream(UpstreamStage::Keywords, "boom").code(),
            ErrorCode::KeywordExtractionError
        );
        assert_eq!(
            PipelineError::MediaResolution("404".into()).code(),
            ErrorCode::VideoDownloadError
        );
        assert_eq!(
            PipelineError::config("bad").code(),
            ErrorCode::UnknownError
        );
    }

    #[test]
    fn test_render_and_integrity_map_to_editing() {
        let render = PipelineError::from(RenderStageError::new(
            RenderStage::Caption(1),
            MediaError::Timeout(900),
        ));
        assert_eq!(render.code(), ErrorCode::VideoEditingError);

        let integrity = PipelineError::from(MediaError::integrity("/tmp/x.mp4", "too small"));
        assert_eq!(integrity.code(), ErrorCode::VideoEditingError);

        let other = PipelineError::from(MediaError::FfmpegNotFound);
        assert_eq!(other.code(), ErrorCode::UnknownError);
    }

    #[test]
    fn test_only_input_is_client_error() {
        assert!(PipelineError::input("x").is_client_error());
        assert!(!PipelineError::script("x").is_client_error());
    }
}
