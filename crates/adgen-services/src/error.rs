//! Service client error types.

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ServiceError {
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self::EmptyResult(message.into())
    }

    /// Build from a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        if status.as_u16() == 429 || status.is_server_error() {
            Self::ServiceUnavailable(format!("{}: {}", status, body.into()))
        } else {
            Self::RequestFailed {
                status: status.as_u16(),
                body: body.into(),
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ServiceUnavailable(_) | ServiceError::Timeout(_) | ServiceError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert!(ServiceError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(ServiceError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!ServiceError::from_status(StatusCode::NOT_FOUND, "").is_retryable());
        assert!(!ServiceError::empty("no audio").is_retryable());
    }
}
