//! Axum HTTP API server for prompt-to-video-ad generation.
//!
//! This crate provides:
//! - `POST /video/generate`, running the whole pipeline per request
//! - Liveness and readiness probes
//! - Per-IP rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
