//! Collaborator handles injected into the pipeline.

use std::sync::Arc;

use adgen_media::{FfmpegRunner, FfprobeProber, MediaProber, RenderEngine};
use adgen_services::{
    build_http_client, HttpDownloader, KeywordExtractor, MediaDownloader, MediaSearch,
    MediaSearchProvider, NarrationSynthesizer, ReplicateClient, ReplicateKeywordExtractor,
    ReplicateNarrator, ReplicateScriptGenerator, ScriptGenerator, ServiceConfig,
};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Every external dependency of a run, built once and shared.
#[derive(Clone)]
pub struct PipelineServices {
    pub script: Arc<dyn ScriptGenerator>,
    pub narrator: Arc<dyn NarrationSynthesizer>,
    pub keywords: Arc<dyn KeywordExtractor>,
    pub search: Arc<dyn MediaSearchProvider>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub engine: Arc<dyn RenderEngine>,
    pub prober: Arc<dyn MediaProber>,
}

impl PipelineServices {
    /// Production collaborators: hosted models, stock-media providers and
    /// the FFmpeg binaries.
    pub fn from_config(services: &ServiceConfig, pipeline: &PipelineConfig) -> PipelineResult<Self> {
        let http = build_http_client(services.http_timeout)
            .map_err(|e| PipelineError::config(format!("HTTP client: {e}")))?;

        let replicate = Arc::new(
            ReplicateClient::new(services, http.clone())
                .map_err(|e| PipelineError::config(e.to_string()))?,
        );
        let search = MediaSearch::from_config(services, http.clone());

        info!(
            script_model = %services.script_model,
            tts_model = %services.tts_model,
            providers = ?search.provider_names(),
            render_timeout_secs = pipeline.render_timeout.as_secs(),
            "Pipeline services configured"
        );

        Ok(Self {
            script: Arc::new(ReplicateScriptGenerator::new(
                replicate.clone(),
                &services.script_model,
            )),
            narrator: Arc::new(ReplicateNarrator::new(
                replicate.clone(),
                http.clone(),
                &services.tts_model,
            )),
            keywords: Arc::new(ReplicateKeywordExtractor::new(
                replicate,
                &services.keyword_model,
            )),
            search: Arc::new(search),
            downloader: Arc::new(HttpDownloader::new(http, services.download_timeout)),
            engine: Arc::new(FfmpegRunner::new().with_timeout(pipeline.render_timeout.as_secs())),
            prober: Arc::new(FfprobeProber),
        })
    }
}

impl std::fmt::Debug for PipelineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineServices").finish_non_exhaustive()
    }
}
