//! Stock-media search across providers.

mod pexels;
mod pixabay;

pub use pexels::PexelsProvider;
pub use pixabay::PixabayProvider;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use adgen_models::AssetKind;

use crate::config::ServiceConfig;
use crate::error::ServiceResult;

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaHit {
    /// Direct URL of the downloadable file
    pub url: String,
    pub creator: String,
    /// Lowercase descriptive tags (may be empty)
    pub tags: Vec<String>,
    /// Provider name, e.g. "pexels"
    pub source: String,
    pub kind: AssetKind,
}

/// A stock-media search backend.
#[async_trait]
pub trait MediaSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, kind: AssetKind, limit: usize) -> ServiceResult<Vec<MediaHit>>;
}

/// How results from several providers are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Providers are asked in order; the first non-empty answer wins
    #[default]
    FirstSuccess,
    /// All providers are asked concurrently; results are concatenated in
    /// provider order and deduplicated by URL
    Union,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_success" | "first" => Ok(MergePolicy::FirstSuccess),
            "union" | "all" => Ok(MergePolicy::Union),
            other => Err(format!("unknown merge policy: {other}")),
        }
    }
}

/// Fans a query out to several providers.
///
/// Provider failures are logged and skipped; when every provider fails the
/// result is an empty list, never an error.
pub struct MediaSearch {
    providers: Vec<Arc<dyn MediaSearchProvider>>,
    policy: MergePolicy,
}

impl MediaSearch {
    pub fn new(providers: Vec<Arc<dyn MediaSearchProvider>>, policy: MergePolicy) -> Self {
        Self { providers, policy }
    }

    /// Providers with configured API keys, Pexels first.
    pub fn from_config(config: &ServiceConfig, http: Client) -> Self {
        let mut providers: Vec<Arc<dyn MediaSearchProvider>> = Vec::new();
        if let Some(key) = &config.pexels_api_key {
            providers.push(Arc::new(PexelsProvider::new(
                http.clone(),
                &config.pexels_base_url,
                key,
            )));
        }
        if let Some(key) = &config.pixabay_api_key {
            providers.push(Arc::new(PixabayProvider::new(
                http,
                &config.pixabay_base_url,
                key,
            )));
        }
        if providers.is_empty() {
            warn!("No stock-media provider configured; every segment will use the fallback asset");
        }
        Self::new(providers, config.search_merge)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    async fn first_success(&self, query: &str, kind: AssetKind, limit: usize) -> Vec<MediaHit> {
        for provider in &self.providers {
            match provider.search(query, kind, limit).await {
                Ok(hits) if !hits.is_empty() => {
                    debug!(provider = provider.name(), hits = hits.len(), "Search hits");
                    return hits;
                }
                Ok(_) => debug!(provider = provider.name(), query, "No hits"),
                Err(e) => warn!(provider = provider.name(), query, error = %e, "Search failed"),
            }
        }
        Vec::new()
    }

    async fn union(&self, query: &str, kind: AssetKind, limit: usize) -> Vec<MediaHit> {
        let results = join_all(
            self.providers
                .iter()
                .map(|provider| provider.search(query, kind, limit)),
        )
        .await;

        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(found) => hits.extend(found.into_iter().filter(|h| seen.insert(h.url.clone()))),
                Err(e) => warn!(provider = provider.name(), query, error = %e, "Search failed"),
            }
        }
        hits
    }
}

#[async_trait]
impl MediaSearchProvider for MediaSearch {
    fn name(&self) -> &str {
        "search"
    }

    async fn search(&self, query: &str, kind: AssetKind, limit: usize) -> ServiceResult<Vec<MediaHit>> {
        Ok(match self.policy {
            MergePolicy::FirstSuccess => self.first_success(query, kind, limit).await,
            MergePolicy::Union => self.union(query, kind, limit).await,
        })
    }
}

/// Split a provider tag string ("a, b c, d") into lowercase tags.
pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    struct StaticProvider {
        name: &'static str,
        result: Result<Vec<&'static str>, ()>,
    }

    #[async_trait]
    impl MediaSearchProvider for StaticProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _q: &str, kind: AssetKind, _limit: usize) -> ServiceResult<Vec<MediaHit>> {
            match &self.result {
                Ok(urls) => Ok(urls
                    .iter()
                    .map(|u| MediaHit {
                        url: u.to_string(),
                        creator: "c".into(),
                        tags: vec![],
                        source: self.name.into(),
                        kind,
                    })
                    .collect()),
                Err(()) => Err(ServiceError::ServiceUnavailable("down".into())),
            }
        }
    }

    fn provider(name: &'static str, result: Result<Vec<&'static str>, ()>) -> Arc<dyn MediaSearchProvider> {
        Arc::new(StaticProvider { name, result })
    }

    #[tokio::test]
    async fn test_first_success_skips_errors_and_empty() {
        let search = MediaSearch::new(
            vec![
                provider("a", Err(())),
                provider("b", Ok(vec![])),
                provider("c", Ok(vec!["u1"])),
                provider("d", Ok(vec!["u2"])),
            ],
            MergePolicy::FirstSuccess,
        );
        let hits = search.search("q", AssetKind::Video, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "c");
    }

    #[tokio::test]
    async fn test_union_dedups_in_provider_order() {
        let search = MediaSearch::new(
            vec![
                provider("a", Ok(vec!["u1", "u2"])),
                provider("b", Err(())),
                provider("c", Ok(vec!["u2", "u3"])),
            ],
            MergePolicy::Union,
        );
        let hits = search.search("q", AssetKind::Image, 5).await.unwrap();
        let urls: Vec<_> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_all_failing_is_empty_not_error() {
        let search = MediaSearch::new(vec![provider("a", Err(()))], MergePolicy::FirstSuccess);
        assert!(search.search("q", AssetKind::Video, 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_merge_policy_parse() {
        assert_eq!("union".parse::<MergePolicy>().unwrap(), MergePolicy::Union);
        assert_eq!("FIRST_SUCCESS".parse::<MergePolicy>().unwrap(), MergePolicy::FirstSuccess);
        assert!("best".parse::<MergePolicy>().is_err());
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags("Bread, bakery ,, Food"), vec!["bread", "bakery", "food"]);
    }
}
