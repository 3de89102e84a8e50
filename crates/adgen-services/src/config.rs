//! Service client configuration.

use std::time::Duration;

use crate::search::MergePolicy;

pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com";
pub const DEFAULT_PEXELS_BASE_URL: &str = "https://api.pexels.com";
pub const DEFAULT_PIXABAY_BASE_URL: &str = "https://pixabay.com";
pub const DEFAULT_SCRIPT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_TTS_MODEL: &str = "minimax/speech-02-hd";

/// Configuration for all external collaborators.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub replicate_api_token: Option<String>,
    pub replicate_base_url: String,
    pub script_model: String,
    pub keyword_model: String,
    pub tts_model: String,
    /// Upper bound for one prediction, polling included
    pub generation_timeout: Duration,
    pub poll_interval: Duration,
    pub pexels_api_key: Option<String>,
    pub pexels_base_url: String,
    pub pixabay_api_key: Option<String>,
    pub pixabay_base_url: String,
    pub search_merge: MergePolicy,
    /// Timeout for plain HTTP requests (search, metadata)
    pub http_timeout: Duration,
    /// Timeout for a whole media download
    pub download_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            replicate_api_token: None,
            replicate_base_url: DEFAULT_REPLICATE_BASE_URL.to_string(),
            script_model: DEFAULT_SCRIPT_MODEL.to_string(),
            keyword_model: DEFAULT_SCRIPT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            generation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
            pexels_api_key: None,
            pexels_base_url: DEFAULT_PEXELS_BASE_URL.to_string(),
            pixabay_api_key: None,
            pixabay_base_url: DEFAULT_PIXABAY_BASE_URL.to_string(),
            search_merge: MergePolicy::FirstSuccess,
            http_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(300),
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            replicate_api_token: non_empty_var("REPLICATE_API_TOKEN"),
            replicate_base_url: non_empty_var("REPLICATE_BASE_URL")
                .unwrap_or(defaults.replicate_base_url),
            script_model: non_empty_var("ADGEN_SCRIPT_MODEL").unwrap_or(defaults.script_model),
            keyword_model: non_empty_var("ADGEN_KEYWORD_MODEL").unwrap_or(defaults.keyword_model),
            tts_model: non_empty_var("ADGEN_TTS_MODEL").unwrap_or(defaults.tts_model),
            generation_timeout: Duration::from_secs(
                std::env::var("ADGEN_GENERATION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            poll_interval: defaults.poll_interval,
            pexels_api_key: non_empty_var("PEXELS_API_KEY"),
            pexels_base_url: non_empty_var("PEXELS_BASE_URL").unwrap_or(defaults.pexels_base_url),
            pixabay_api_key: non_empty_var("PIXABAY_API_KEY"),
            pixabay_base_url: non_empty_var("PIXABAY_BASE_URL")
                .unwrap_or(defaults.pixabay_base_url),
            search_merge: std::env::var("ADGEN_SEARCH_MERGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            http_timeout: Duration::from_secs(
                std::env::var("ADGEN_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            download_timeout: defaults.download_timeout,
        }
    }

    pub fn has_replicate(&self) -> bool {
        self.replicate_api_token.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.script_model, "openai/gpt-4o");
        assert_eq!(config.tts_model, "minimax/speech-02-hd");
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.search_merge, MergePolicy::FirstSuccess);
        assert!(!config.has_replicate());
    }
}
