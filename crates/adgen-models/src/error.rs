//! Error types for model-level operations.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by the pure planning functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Script contains no sentences")]
    EmptyScript,

    #[error("No visual assets to place on the timeline")]
    NoAssets,

    #[error("Invalid timeline duration: {0}")]
    InvalidDuration(f64),
}
