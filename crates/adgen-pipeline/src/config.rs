//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use adgen_media::RenderSettings;
use adgen_models::{CaptionStyle, EncodingConfig, RenderProfile, VoiceParams};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_WORK_DIR: &str = "/tmp/adgen";
pub const DEFAULT_FALLBACK_ASSET: &str = "assets/fallback.png";

/// How resolved assets are bound to the script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// One asset per segment, searched with that segment's keywords
    #[default]
    PerSegment,
    /// A handful of assets searched once for the whole script
    WholeScript,
}

impl FromStr for BindingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_segment" | "segment" => Ok(BindingMode::PerSegment),
            "whole_script" | "script" => Ok(BindingMode::WholeScript),
            other => Err(format!("unknown binding mode: {other}")),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for scratch directories
    pub work_dir: PathBuf,
    /// Downloaded stock media
    pub asset_dir: PathBuf,
    /// Narration audio files
    pub audio_dir: PathBuf,
    /// Final ads and manifests, one directory per run
    pub output_dir: PathBuf,
    /// Static placeholder image, never deleted
    pub fallback_asset: PathBuf,
    /// Burn segment captions into the final ad
    pub captions: bool,
    pub binding_mode: BindingMode,
    /// Number of assets fetched in whole-script mode
    pub whole_script_assets: usize,
    /// Maximum segments resolved concurrently
    pub max_resolve_parallel: usize,
    /// Retries per segment before falling back
    pub resolve_retries: u32,
    /// Hits requested from each search
    pub search_limit: usize,
    /// Providers whose hits are accepted without a tag match
    pub trusted_sources: Vec<String>,
    /// Timeout for one FFmpeg invocation
    pub render_timeout: Duration,
    pub keep_intermediates: bool,
    pub max_prompt_chars: usize,
    pub profile: RenderProfile,
    pub encoding: EncodingConfig,
    pub caption_style: CaptionStyle,
    pub voice: VoiceParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_work_dir(DEFAULT_WORK_DIR)
    }
}

impl PipelineConfig {
    /// Defaults with every directory placed under `work_dir`.
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            asset_dir: work_dir.join("assets"),
            audio_dir: work_dir.join("audio"),
            output_dir: work_dir.join("output"),
            work_dir,
            fallback_asset: PathBuf::from(DEFAULT_FALLBACK_ASSET),
            captions: true,
            binding_mode: BindingMode::PerSegment,
            whole_script_assets: 4,
            max_resolve_parallel: 4,
            resolve_retries: 1,
            search_limit: 5,
            trusted_sources: vec!["pexels".to_string()],
            render_timeout: Duration::from_secs(900),
            keep_intermediates: false,
            max_prompt_chars: 2000,
            profile: RenderProfile::default(),
            encoding: EncodingConfig::default(),
            caption_style: CaptionStyle::default(),
            voice: VoiceParams::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let work_dir = std::env::var("ADGEN_WORK_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR));
        let defaults = Self::with_work_dir(&work_dir);

        let mut profile = defaults.profile.clone();
        profile.width = env_parse("ADGEN_WIDTH").unwrap_or(profile.width);
        profile.height = env_parse("ADGEN_HEIGHT").unwrap_or(profile.height);
        profile.fps = env_parse("ADGEN_FPS").unwrap_or(profile.fps);

        let mut encoding = defaults.encoding.clone();
        if let Some(crf) = env_parse("ADGEN_CRF") {
            encoding = encoding.with_crf(crf);
        }
        if let Ok(preset) = std::env::var("ADGEN_PRESET") {
            if !preset.trim().is_empty() {
                encoding = encoding.with_preset(preset.trim());
            }
        }

        let mut voice = defaults.voice.clone();
        if let Ok(voice_id) = std::env::var("ADGEN_VOICE_ID") {
            if !voice_id.trim().is_empty() {
                voice = voice.with_voice(voice_id.trim());
            }
        }
        voice.speed = env_parse("ADGEN_VOICE_SPEED").unwrap_or(voice.speed);
        voice.pitch = env_parse("ADGEN_VOICE_PITCH").unwrap_or(voice.pitch);

        Self {
            asset_dir: env_path("ADGEN_ASSET_DIR").unwrap_or(defaults.asset_dir),
            audio_dir: env_path("ADGEN_AUDIO_DIR").unwrap_or(defaults.audio_dir),
            output_dir: env_path("ADGEN_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            fallback_asset: env_path("ADGEN_FALLBACK_ASSET").unwrap_or(defaults.fallback_asset),
            captions: env_bool("ADGEN_CAPTIONS").unwrap_or(defaults.captions),
            binding_mode: env_parse("ADGEN_BINDING_MODE").unwrap_or(defaults.binding_mode),
            whole_script_assets: env_parse("ADGEN_WHOLE_SCRIPT_ASSETS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.whole_script_assets),
            max_resolve_parallel: env_parse("ADGEN_MAX_RESOLVE_PARALLEL")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_resolve_parallel),
            resolve_retries: env_parse("ADGEN_RESOLVE_RETRIES").unwrap_or(defaults.resolve_retries),
            search_limit: env_parse("ADGEN_SEARCH_LIMIT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.search_limit),
            trusted_sources: std::env::var("ADGEN_TRUSTED_SOURCES")
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_lowercase())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.trusted_sources),
            render_timeout: Duration::from_secs(
                env_parse("ADGEN_RENDER_TIMEOUT_SECS").unwrap_or(defaults.render_timeout.as_secs()),
            ),
            keep_intermediates: env_bool("ADGEN_KEEP_INTERMEDIATES")
                .unwrap_or(defaults.keep_intermediates),
            max_prompt_chars: env_parse("ADGEN_MAX_PROMPT_CHARS")
                .unwrap_or(defaults.max_prompt_chars),
            work_dir,
            profile,
            encoding,
            caption_style: defaults.caption_style,
            voice,
        }
    }

    /// Reject settings the narration service cannot honour.
    pub fn validate(&self) -> PipelineResult<()> {
        self.voice
            .validate()
            .map_err(|e| PipelineError::config(format!("invalid voice settings: {e}")))
    }

    /// Settings handed to the render pipeline.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            profile: self.profile.clone(),
            encoding: self.encoding.clone(),
            caption_style: self.caption_style.clone(),
            work_dir: self.work_dir.clone(),
            keep_intermediates: self.keep_intermediates,
            ..RenderSettings::default()
        }
    }

    /// Whether hits from `source` skip the tag relevance check.
    pub fn is_trusted(&self, source: &str) -> bool {
        self.trusted_sources
            .iter()
            .any(|t| t.eq_ignore_ascii_case(source))
    }

    /// Create the working directories.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.work_dir, &self.asset_dir, &self.audio_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// `<output_dir>/<run_id>`
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.output_dir.join(run_id)
    }

    pub fn fallback_asset(&self) -> &Path {
        &self.fallback_asset
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}
