//! End-to-end run: prompt to rendered ad and manifest.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::Instrument;
use uuid::Uuid;

use adgen_media::fs_utils::remove_best_effort;
use adgen_media::{AssetLease, RenderJob, RenderPipeline};
use adgen_models::{
    assign_segment_timings, plan_timeline, segment_script, AssetBinding, AssetManifest,
    Intermediates, RunId, Segment, SegmentTiming, VisualAsset,
};
use adgen_services::SCRIPT_MAX_TOKENS;

use crate::config::{BindingMode, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::keywords::local_keywords;
use crate::logging::RunLogger;
use crate::manifest::write_manifest;
use crate::resolver::AssetResolver;
use crate::services::PipelineServices;

/// Upper bound for script generation.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// File name of the rendered ad inside the run directory.
pub const FINAL_AD_FILE: &str = "final_ad.mp4";

/// Runs the prompt-to-ad pipeline.
pub struct AdPipeline {
    config: PipelineConfig,
    services: PipelineServices,
    resolver: AssetResolver,
    renderer: RenderPipeline,
}

impl AdPipeline {
    pub fn new(config: PipelineConfig, services: PipelineServices) -> Self {
        let resolver = AssetResolver::new(
            services.search.clone(),
            services.downloader.clone(),
            &config,
        );
        let renderer = RenderPipeline::new(
            services.engine.clone(),
            services.prober.clone(),
            config.render_settings(),
        );

        Self {
            config,
            services,
            resolver,
            renderer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate one ad for `prompt`.
    pub async fn run(&self, prompt: &str) -> PipelineResult<AssetManifest> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "pipeline");
        let started = Instant::now();

        let result = self
            .execute(&run_id, prompt, &logger)
            .instrument(logger.create_span())
            .await;

        let outcome = match &result {
            Ok(manifest) => {
                logger.log_completion(&format!(
                    "{} in {:.1}s ({} fallback bindings)",
                    manifest.final_ad.display(),
                    started.elapsed().as_secs_f64(),
                    manifest.fallback_count()
                ));
                "success"
            }
            Err(e) => {
                logger.log_error(&format!("{} ({})", e, e.code()));
                e.code().as_str()
            }
        };
        metrics::counter!("adgen_pipeline_runs_total", "outcome" => outcome).increment(1);
        metrics::histogram!("adgen_pipeline_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn execute(
        &self,
        run_id: &RunId,
        prompt: &str,
        logger: &RunLogger,
    ) -> PipelineResult<AssetManifest> {
        let prompt = validate_prompt(prompt, self.config.max_prompt_chars)?;
        logger.log_start(&format!("{} prompt chars", prompt.chars().count()));
        self.config.ensure_dirs().await?;

        let script_log = logger.step("script");
        let script = self.generate_script(&prompt).await?;
        let segments = segment_script(&script).map_err(PipelineError::script)?;
        script_log.log_progress(&format!("{} segments", segments.len()));

        let audio_path = self.synthesize(&script, logger).await?;

        let result = self
            .after_narration(run_id, prompt, script, segments, &audio_path, logger)
            .await;
        if result.is_err() {
            remove_best_effort(&audio_path);
        }
        result
    }

    async fn after_narration(
        &self,
        run_id: &RunId,
        prompt: String,
        script: String,
        mut segments: Vec<Segment>,
        audio_path: &Path,
        logger: &RunLogger,
    ) -> PipelineResult<AssetManifest> {
        let keywords = self.keywords(&script, logger).await;

        let bindings = self.bind_assets(&segments, &keywords).await;
        // From here on the downloaded files are released on every path
        let lease = AssetLease::new(bindings.iter().map(|b| &b.asset));
        let fallbacks = bindings.iter().filter(|b| b.fallback).count();
        if fallbacks > 0 {
            logger
                .step("resolve")
                .log_warning(&format!("{fallbacks}/{} bindings use the fallback asset", bindings.len()));
        }

        let duration = self
            .services
            .prober
            .duration(audio_path)
            .await
            .map_err(PipelineError::audio)?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PipelineError::audio(format!(
                "narration has no measurable duration ({duration})"
            )));
        }

        let assets: Vec<VisualAsset> = bindings.iter().map(|b| b.asset.clone()).collect();
        let timeline = plan_timeline(duration, &assets)?;
        assign_segment_timings(&mut segments, duration)?;
        logger.step("plan").log_progress(&format!(
            "{} timeline entries over {:.2}s",
            timeline.len(),
            duration
        ));

        let run_dir = self.config.run_dir(run_id.as_str());
        tokio::fs::create_dir_all(&run_dir).await?;

        let job = RenderJob {
            run_id: run_id.clone(),
            timeline,
            audio_path: audio_path.to_path_buf(),
            output_path: run_dir.join(FINAL_AD_FILE),
            captions: self.config.captions.then(|| segments.clone()),
            total_duration: duration,
            assets: lease,
        };
        let outcome = self.renderer.render(job).await?;

        let manifest = AssetManifest {
            run_id: run_id.clone(),
            created_at: chrono::Utc::now(),
            prompt,
            script,
            segment_timings: segments.iter().map(SegmentTiming::from).collect(),
            segments,
            keywords,
            audio: audio_path.to_path_buf(),
            media: bindings,
            final_ad: outcome.final_path,
            audio_duration: duration,
            final_duration: outcome.measured_duration,
            intermediates: Intermediates {
                normalized_video: outcome.normalized_path,
                muxed_video: outcome.muxed_path,
            },
        };
        write_manifest(&run_dir, &manifest).await?;

        Ok(manifest)
    }

    async fn generate_script(&self, prompt: &str) -> PipelineResult<String> {
        let script = tokio::time::timeout(
            SCRIPT_TIMEOUT,
            self.services.script.generate(prompt, SCRIPT_MAX_TOKENS),
        )
        .await
        .map_err(|_| PipelineError::script(format!("timed out after {}s", SCRIPT_TIMEOUT.as_secs())))?
        .map_err(PipelineError::script)?;

        let script = script.trim().to_string();
        if script.is_empty() {
            return Err(PipelineError::script("generated script is empty"));
        }
        Ok(script)
    }

    /// Synthesize and persist the narration as `narration_<uuid>.wav`.
    async fn synthesize(&self, script: &str, logger: &RunLogger) -> PipelineResult<PathBuf> {
        let audio = self
            .services
            .narrator
            .synthesize(script, &self.config.voice)
            .await
            .map_err(PipelineError::audio)?;
        if audio.is_empty() {
            return Err(PipelineError::audio("narration audio is empty"));
        }

        let path = self
            .config
            .audio_dir
            .join(format!("narration_{}.wav", Uuid::new_v4().simple()));
        tokio::fs::write(&path, &audio).await?;

        logger
            .step("narration")
            .log_progress(&format!("{} bytes at {}", audio.len(), path.display()));
        Ok(path)
    }

    /// Extracted keywords, or the local fallback when extraction fails.
    async fn keywords(&self, script: &str, logger: &RunLogger) -> Vec<String> {
        let log = logger.step("keywords");
        match self.services.keywords.extract(script).await {
            Ok(keywords) if !keywords.is_empty() => {
                log.log_progress(&keywords.join(", "));
                keywords
            }
            Ok(_) => {
                log.log_warning("extractor returned no keywords, using local keywords");
                local_keywords(script)
            }
            Err(e) => {
                log.log_warning(&format!("{e}, using local keywords"));
                local_keywords(script)
            }
        }
    }

    async fn bind_assets(&self, segments: &[Segment], keywords: &[String]) -> Vec<AssetBinding> {
        match self.config.binding_mode {
            BindingMode::PerSegment => self.resolver.resolve_all(segments, keywords).await,
            BindingMode::WholeScript => {
                self.resolver
                    .resolve_whole_script(keywords, self.config.whole_script_assets)
                    .await
            }
        }
    }
}

/// Trimmed prompt, or an input error when it is empty or too long.
pub fn validate_prompt(prompt: &str, max_chars: usize) -> PipelineResult<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PipelineError::input("prompt is required"));
    }
    let chars = prompt.chars().count();
    if chars > max_chars {
        return Err(PipelineError::input(format!(
            "prompt is {chars} characters, the limit is {max_chars}"
        )));
    }
    Ok(prompt.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_media::{FfmpegCommand, MediaError, MediaProber, MediaResult, RenderEngine};
    use adgen_models::{AssetKind, ErrorCode, VoiceParams};
    use adgen_services::{
        KeywordExtractor, MediaDownloader, MediaHit, MediaSearchProvider, NarrationSynthesizer,
        ScriptGenerator, ServiceError, ServiceResult,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const SCRIPT: &str = "Craving fresh bread? Sweet Haven Bakery bakes every morning. Visit us today!";

    struct FakeScript(ServiceResult<String>);

    #[async_trait]
    impl ScriptGenerator for FakeScript {
        async fn generate(&self, _prompt: &str, max_tokens: u32) -> ServiceResult<String> {
            assert_eq!(max_tokens, SCRIPT_MAX_TOKENS);
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(ServiceError::ServiceUnavailable("model down".into())),
            }
        }
    }

    struct FakeNarrator(Vec<u8>);

    #[async_trait]
    impl NarrationSynthesizer for FakeNarrator {
        async fn synthesize(&self, _text: &str, _voice: &VoiceParams) -> ServiceResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    struct FakeKeywords(Option<Vec<String>>);

    #[async_trait]
    impl KeywordExtractor for FakeKeywords {
        async fn extract(&self, _text: &str) -> ServiceResult<Vec<String>> {
            self.0
                .clone()
                .ok_or_else(|| ServiceError::ServiceUnavailable("keywords down".into()))
        }
    }

    struct FakeSearch(Vec<MediaHit>);

    #[async_trait]
    impl MediaSearchProvider for FakeSearch {
        fn name(&self) -> &str {
            "fake"
        }

        async fn search(&self, _q: &str, kind: AssetKind, _limit: usize) -> ServiceResult<Vec<MediaHit>> {
            Ok(self.0.iter().filter(|h| h.kind == kind).cloned().collect())
        }
    }

    struct FakeDownloader;

    #[async_trait]
    impl MediaDownloader for FakeDownloader {
        async fn download(&self, _url: &str, dest: &Path) -> ServiceResult<u64> {
            tokio::fs::write(dest, b"clip").await?;
            Ok(4)
        }
    }

    struct FakeEngine {
        calls: AtomicUsize,
        fail_at: Option<usize>,
        commands: Mutex<Vec<FfmpegCommand>>,
    }

    impl FakeEngine {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_at,
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RenderEngine for FakeEngine {
        async fn execute(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.commands.lock().unwrap().push(cmd.clone());
            if self.fail_at == Some(n) {
                return Err(MediaError::ffmpeg_failed("encoder error", None, Some(1)));
            }
            std::fs::write(cmd.output(), vec![0u8; 4096])?;
            Ok(())
        }
    }

    struct FakeProber(f64);

    #[async_trait]
    impl MediaProber for FakeProber {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            Ok(self.0)
        }
    }

    struct Fixture {
        root: TempDir,
        config: PipelineConfig,
        engine: Arc<FakeEngine>,
        script: ServiceResult<String>,
        audio: Vec<u8>,
        keywords: Option<Vec<String>>,
        hits: Vec<MediaHit>,
        duration: f64,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let mut config = PipelineConfig::with_work_dir(root.path().join("work"));
            let fallback = root.path().join("fallback.png");
            std::fs::write(&fallback, b"png").unwrap();
            config.fallback_asset = fallback;

            Self {
                root,
                config,
                engine: Arc::new(FakeEngine::new(None)),
                script: Ok(SCRIPT.to_string()),
                audio: vec![1u8; 2048],
                keywords: Some(vec!["bread".to_string(), "bakery".to_string()]),
                hits: Vec::new(),
                duration: 9.0,
            }
        }

        fn pipeline(&self) -> AdPipeline {
            let script = match &self.script {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(ServiceError::ServiceUnavailable("down".into())),
            };
            let services = PipelineServices {
                script: Arc::new(FakeScript(script)),
                narrator: Arc::new(FakeNarrator(self.audio.clone())),
                keywords: Arc::new(FakeKeywords(self.keywords.clone())),
                search: Arc::new(FakeSearch(self.hits.clone())),
                downloader: Arc::new(FakeDownloader),
                engine: self.engine.clone(),
                prober: Arc::new(FakeProber(self.duration)),
            };
            AdPipeline::new(self.config.clone(), services)
        }

        fn downloaded_files(&self) -> usize {
            std::fs::read_dir(&self.config.asset_dir)
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    fn video_hit(url: &str) -> MediaHit {
        MediaHit {
            url: url.to_string(),
            creator: "ana".to_string(),
            tags: vec!["fresh bread".to_string()],
            source: "pixabay".to_string(),
            kind: AssetKind::Video,
        }
    }

    #[test]
    fn test_validate_prompt() {
        assert_eq!(validate_prompt("  a bakery  ", 100).unwrap(), "a bakery");
        assert!(matches!(
            validate_prompt("   ", 100),
            Err(PipelineError::InputValidation(_))
        ));
        assert!(validate_prompt("abcdef", 5).is_err());
    }

    #[tokio::test]
    async fn test_run_produces_manifest() {
        let mut fixture = Fixture::new();
        fixture.hits = vec![video_hit("https://cdn/a.mp4")];
        let pipeline = fixture.pipeline();

        let manifest = pipeline.run("Sweet Haven Bakery in Austin").await.unwrap();

        assert_eq!(manifest.segments.len(), 3);
        assert_eq!(manifest.media.len(), 3);
        assert_eq!(manifest.fallback_count(), 0);
        assert_eq!(manifest.keywords, vec!["bread", "bakery"]);
        assert!((manifest.audio_duration - 9.0).abs() < 1e-9);
        assert!(manifest.final_ad.exists());
        assert!(manifest.audio.exists());
        assert!(manifest
            .audio
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("narration_"));

        // Segment windows tile the narration exactly
        assert_eq!(manifest.segment_timings[0].start_time, 0.0);
        for pair in manifest.segment_timings.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
        assert_eq!(manifest.segment_timings[2].end_time, 9.0);

        // Normalize, mux and one caption pass per segment
        assert_eq!(fixture.engine.calls.load(Ordering::SeqCst), 5);

        let run_dir = fixture.config.run_dir(manifest.run_id.as_str());
        assert!(run_dir.join("manifest.json").exists());
        // Downloaded sources are released after rendering
        assert_eq!(fixture.downloaded_files(), 0);
    }

    #[tokio::test]
    async fn test_captions_disabled_skips_caption_passes() {
        let mut fixture = Fixture::new();
        fixture.config.captions = false;
        let pipeline = fixture.pipeline();

        pipeline.run("a bakery").await.unwrap();
        assert_eq!(fixture.engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_media_binds_fallback_everywhere() {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline();

        let manifest = pipeline.run("a bakery").await.unwrap();
        assert_eq!(manifest.fallback_count(), manifest.media.len());
        // The placeholder is never released
        assert!(fixture.config.fallback_asset.exists());
    }

    #[tokio::test]
    async fn test_keyword_failure_uses_local_keywords() {
        let mut fixture = Fixture::new();
        fixture.keywords = None;
        let pipeline = fixture.pipeline();

        let manifest = pipeline.run("a bakery").await.unwrap();
        assert!(manifest.keywords.contains(&"bread".to_string()));
        assert!(!manifest.keywords.contains(&"today".to_string()));
    }

    #[tokio::test]
    async fn test_empty_prompt_is_client_error() {
        let fixture = Fixture::new();
        let err = fixture.pipeline().run("   ").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingPrompt);
        assert_eq!(fixture.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_script_failure() {
        let mut fixture = Fixture::new();
        fixture.script = Err(ServiceError::ServiceUnavailable("down".into()));
        let err = fixture.pipeline().run("a bakery").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ScriptGenerationError);
    }

    #[tokio::test]
    async fn test_punctuation_only_script_is_script_error() {
        let mut fixture = Fixture::new();
        fixture.script = Ok("?!...".to_string());
        let err = fixture.pipeline().run("a bakery").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ScriptGenerationError);
    }

    #[tokio::test]
    async fn test_empty_audio_is_audio_error() {
        let mut fixture = Fixture::new();
        fixture.audio = Vec::new();
        let err = fixture.pipeline().run("a bakery").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AudioGenerationError);
    }

    #[tokio::test]
    async fn test_unmeasurable_narration_releases_assets() {
        let mut fixture = Fixture::new();
        fixture.hits = vec![video_hit("https://cdn/a.mp4")];
        fixture.duration = 0.0;
        let err = fixture.pipeline().run("a bakery").await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::AudioGenerationError);
        assert_eq!(fixture.downloaded_files(), 0);
        assert_eq!(fixture.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_render_failure_releases_assets() {
        let mut fixture = Fixture::new();
        fixture.hits = vec![video_hit("https://cdn/a.mp4")];
        fixture.engine = Arc::new(FakeEngine::new(Some(1)));
        let err = fixture.pipeline().run("a bakery").await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::VideoEditingError);
        assert_eq!(fixture.downloaded_files(), 0);
        assert!(fixture.config.fallback_asset.exists());
        // Narration of a failed run is removed too
        let audio_files = std::fs::read_dir(&fixture.config.audio_dir).unwrap().count();
        assert_eq!(audio_files, 0);
    }

    #[tokio::test]
    async fn test_whole_script_mode() {
        let mut fixture = Fixture::new();
        fixture.config.binding_mode = crate::config::BindingMode::WholeScript;
        fixture.config.whole_script_assets = 2;
        fixture.hits = vec![
            video_hit("https://cdn/a.mp4"),
            video_hit("https://cdn/b.mp4"),
            video_hit("https://cdn/c.mp4"),
        ];
        let pipeline = fixture.pipeline();

        let manifest = pipeline.run("a bakery").await.unwrap();
        assert_eq!(manifest.media.len(), 2);
        assert!(manifest.media.iter().all(|b| b.segment_index.is_none()));

        let normalize = fixture.engine.commands.lock().unwrap()[0].clone();
        assert_eq!(normalize.inputs().len(), 2);
    }
}
