//! Prompt-to-video-ad pipeline.
//!
//! [`AdPipeline`] drives one run end to end:
//! script, narration, keywords, asset resolution, timeline planning,
//! rendering and the persisted [`AssetManifest`](adgen_models::AssetManifest).
//! All external collaborators arrive through [`PipelineServices`].

pub mod config;
pub mod error;
pub mod keywords;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod resolver;
pub mod retry;
pub mod services;

pub use config::{BindingMode, PipelineConfig};
pub use error::{PipelineError, PipelineResult, UpstreamStage};
pub use keywords::local_keywords;
pub use logging::RunLogger;
pub use manifest::{manifest_path, read_manifest, write_manifest};
pub use orchestrator::{validate_prompt, AdPipeline};
pub use resolver::{build_query, AssetResolver, Resolution};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use services::PipelineServices;
