//! Application state.

use std::sync::Arc;

use adgen_pipeline::{AdPipeline, PipelineConfig, PipelineResult, PipelineServices};
use adgen_services::ServiceConfig;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<AdPipeline>,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: AdPipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Build the production pipeline from environment variables.
    pub fn from_env(config: ApiConfig) -> PipelineResult<Self> {
        let pipeline_config = PipelineConfig::from_env();
        pipeline_config.validate()?;
        let services = PipelineServices::from_config(&ServiceConfig::from_env(), &pipeline_config)?;
        Ok(Self::new(config, AdPipeline::new(pipeline_config, services)))
    }
}
