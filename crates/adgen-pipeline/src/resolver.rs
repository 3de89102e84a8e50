//! Asset resolution: turns segments and keywords into local visual assets.
//!
//! Resolution never fails. Any search miss, provider error or download
//! failure (after retries) binds the static placeholder instead, so a
//! single bad segment can never abort a run.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use adgen_models::{AssetBinding, AssetKind, Segment, VisualAsset};
use adgen_services::{extension_for, MediaDownloader, MediaHit, MediaSearchProvider};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::retry::{retry_async, RetryConfig};

/// Keywords used in one search query.
const QUERY_KEYWORDS: usize = 3;

/// Outcome of resolving one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(VisualAsset),
    Fallback { asset: VisualAsset, reason: String },
}

impl Resolution {
    pub fn asset(&self) -> &VisualAsset {
        match self {
            Resolution::Found(asset) | Resolution::Fallback { asset, .. } => asset,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }

    pub fn into_binding(self, segment_index: Option<usize>) -> AssetBinding {
        let fallback = self.is_fallback();
        let asset = match self {
            Resolution::Found(asset) | Resolution::Fallback { asset, .. } => asset,
        };
        AssetBinding {
            segment_index,
            asset,
            fallback,
        }
    }
}

/// Resolves segments to downloaded stock media.
pub struct AssetResolver {
    search: Arc<dyn MediaSearchProvider>,
    downloader: Arc<dyn MediaDownloader>,
    asset_dir: PathBuf,
    fallback: VisualAsset,
    search_limit: usize,
    trusted_sources: Vec<String>,
    max_parallel: usize,
    retry: RetryConfig,
}

impl AssetResolver {
    pub fn new(
        search: Arc<dyn MediaSearchProvider>,
        downloader: Arc<dyn MediaDownloader>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            search,
            downloader,
            asset_dir: config.asset_dir.clone(),
            fallback: VisualAsset::placeholder(&config.fallback_asset),
            search_limit: config.search_limit.max(1),
            trusted_sources: config.trusted_sources.clone(),
            max_parallel: config.max_resolve_parallel.max(1),
            retry: RetryConfig::new("resolve_asset").with_max_retries(config.resolve_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn fallback_asset(&self) -> &VisualAsset {
        &self.fallback
    }

    /// Resolve one segment. Never returns an error.
    pub async fn resolve(&self, segment: &Segment, keywords: &[String]) -> Resolution {
        let query = build_query(&segment.text, keywords);
        if query.is_empty() {
            return self.fall_back(segment.index, "empty search query");
        }

        let attempt = retry_async(&self.retry, || self.attempt(&query, keywords, segment.index))
            .await
            .into_result();

        match attempt {
            Ok(Some(asset)) => {
                debug!(
                    segment_index = segment.index,
                    path = %asset.source_path.display(),
                    source = %asset.origin_source,
                    "Segment resolved"
                );
                Resolution::Found(asset)
            }
            Ok(None) => self.fall_back(segment.index, &format!("no relevant media for '{query}'")),
            Err(e) => self.fall_back(segment.index, &e.to_string()),
        }
    }

    /// Resolve every segment with bounded concurrency; bindings come back
    /// in segment order once all resolutions finished.
    pub async fn resolve_all(&self, segments: &[Segment], keywords: &[String]) -> Vec<AssetBinding> {
        let resolutions: Vec<BoxFuture<'_, AssetBinding>> = segments
            .iter()
            .map(|segment| {
                async move {
                    self.resolve(segment, keywords)
                        .await
                        .into_binding(Some(segment.index))
                }
                .boxed()
            })
            .collect();
        let bindings: Vec<AssetBinding> = stream::iter(resolutions)
            .buffered(self.max_parallel)
            .collect()
            .await;

        let fallbacks = bindings.iter().filter(|b| b.fallback).count();
        info!(
            segments = segments.len(),
            fallbacks,
            "Assets resolved per segment"
        );
        bindings
    }

    /// Search once for the whole script and download up to `count` hits.
    ///
    /// Falls back to a single placeholder binding when nothing downloads.
    pub async fn resolve_whole_script(&self, keywords: &[String], count: usize) -> Vec<AssetBinding> {
        let query = keywords
            .iter()
            .take(QUERY_KEYWORDS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let count = count.max(1);

        let hits = if query.is_empty() {
            Vec::new()
        } else {
            match self.candidates(&query, keywords, self.search_limit.max(count)).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query, error = %e, "Whole-script search failed");
                    Vec::new()
                }
            }
        };

        let downloaded: Vec<VisualAsset> = stream::iter(hits.into_iter().take(count).enumerate())
            .map(|(slot, hit)| async move {
                retry_async(&self.retry, || self.download(&hit, slot))
                    .await
                    .into_result()
            })
            .buffered(self.max_parallel)
            .filter_map(|result| async move {
                match result {
                    Ok(asset) => Some(asset),
                    Err(e) => {
                        warn!(error = %e, "Whole-script download failed");
                        None
                    }
                }
            })
            .collect()
            .await;

        if downloaded.is_empty() {
            let resolution = self.fall_back_script(&query);
            return vec![resolution.into_binding(None)];
        }

        info!(assets = downloaded.len(), query, "Assets resolved for whole script");
        downloaded
            .into_iter()
            .map(|asset| Resolution::Found(asset).into_binding(None))
            .collect()
    }

    /// One search-and-download attempt over the accepted candidates, in
    /// ranking order. `Ok(None)` means nothing relevant exists, which
    /// retrying cannot fix.
    async fn attempt(
        &self,
        query: &str,
        keywords: &[String],
        segment_index: usize,
    ) -> PipelineResult<Option<VisualAsset>> {
        let hits = self.candidates(query, keywords, self.search_limit).await?;
        let mut last_error = None;
        for hit in &hits {
            match self.download(hit, segment_index).await {
                Ok(asset) => return Ok(Some(asset)),
                Err(e) => {
                    debug!(segment_index, url = %hit.url, error = %e, "Candidate download failed");
                    last_error = Some(e);
                }
            }
        }
        last_error.map_or(Ok(None), Err)
    }

    /// Relevant hits, videos first, images only when no video qualifies.
    async fn candidates(
        &self,
        query: &str,
        keywords: &[String],
        limit: usize,
    ) -> PipelineResult<Vec<MediaHit>> {
        for kind in [AssetKind::Video, AssetKind::Image] {
            let hits = self
                .search
                .search(query, kind, limit)
                .await
                .map_err(|e| PipelineError::MediaResolution(e.to_string()))?;

            let total = hits.len();
            let accepted: Vec<MediaHit> = hits
                .into_iter()
                .filter(|hit| self.is_relevant(hit, keywords))
                .collect();

            debug!(query, %kind, total, accepted = accepted.len(), "Search candidates");
            if !accepted.is_empty() {
                return Ok(accepted);
            }
        }
        Ok(Vec::new())
    }

    async fn download(&self, hit: &MediaHit, slot: usize) -> PipelineResult<VisualAsset> {
        let dest = self.asset_path(hit, slot);
        self.downloader
            .download(&hit.url, &dest)
            .await
            .map_err(|e| PipelineError::MediaResolution(format!("{}: {e}", hit.url)))?;

        Ok(
            VisualAsset::new(dest, hit.kind, hit.creator.clone(), hit.source.clone())
                .with_tags(hit.tags.iter().cloned()),
        )
    }

    /// `<asset_dir>/<kind>_<slot>_<millis>_<uuid>.<ext>`
    fn asset_path(&self, hit: &MediaHit, slot: usize) -> PathBuf {
        self.asset_dir.join(format!(
            "{}_{}_{}_{}.{}",
            hit.kind,
            slot,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension_for(&hit.url, hit.kind)
        ))
    }

    fn is_relevant(&self, hit: &MediaHit, keywords: &[String]) -> bool {
        if self
            .trusted_sources
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&hit.source))
        {
            return true;
        }
        hit.tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            keywords
                .iter()
                .filter(|k| !k.trim().is_empty())
                .any(|k| tag.contains(&k.trim().to_lowercase()))
        })
    }

    fn fall_back(&self, segment_index: usize, reason: &str) -> Resolution {
        warn!(segment_index, reason, "Using fallback asset");
        metrics::counter!("adgen_fallback_bindings_total", "mode" => "per_segment").increment(1);
        Resolution::Fallback {
            asset: self.fallback.clone(),
            reason: reason.to_string(),
        }
    }

    fn fall_back_script(&self, query: &str) -> Resolution {
        warn!(query, "No whole-script asset resolved, using fallback asset");
        metrics::counter!("adgen_fallback_bindings_total", "mode" => "whole_script").increment(1);
        Resolution::Fallback {
            asset: self.fallback.clone(),
            reason: format!("no media resolved for '{query}'"),
        }
    }
}

/// Search query for a segment: the keywords it mentions, else the first
/// keywords, else its own text.
pub fn build_query(text: &str, keywords: &[String]) -> String {
    let lower = text.to_lowercase();
    let usable: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();

    let present: Vec<&str> = usable
        .iter()
        .copied()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .take(QUERY_KEYWORDS)
        .collect();

    if !present.is_empty() {
        return present.join(" ");
    }
    if !usable.is_empty() {
        return usable[..usable.len().min(QUERY_KEYWORDS)].join(" ");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
