use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use adgen_models::AssetKind;

use super::{split_tags, MediaHit, MediaSearchProvider};
use crate::error::{ServiceError, ServiceResult};

const SOURCE: &str = "pixabay";

/// Pixabay rejects `per_page` below this.
const MIN_PER_PAGE: usize = 3;

#[derive(Debug, Deserialize)]
struct SearchResult<T> {
    #[serde(default = "Vec::new")]
    hits: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VideoHit {
    #[serde(default)]
    tags: String,
    #[serde(default)]
    user: String,
    videos: VideoRenditions,
}

#[derive(Debug, Deserialize)]
struct VideoRenditions {
    large: Option<Rendition>,
    medium: Option<Rendition>,
    small: Option<Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ImageHit {
    #[serde(default)]
    tags: String,
    #[serde(default)]
    user: String,
    #[serde(rename = "largeImageURL", default)]
    large_image_url: Option<String>,
    #[serde(rename = "webformatURL", default)]
    webformat_url: Option<String>,
}

/// Pixabay video and image search. Every hit carries descriptive tags.
pub struct PixabayProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

impl PixabayProvider {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> ServiceResult<SearchResult<T>> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, body));
        }
        Ok(response.json().await?)
    }
}

fn best_rendition(videos: &VideoRenditions) -> Option<String> {
    [&videos.large, &videos.medium, &videos.small]
        .into_iter()
        .flatten()
        .map(|r| r.url.clone())
        .find(|url| !url.is_empty())
}

#[async_trait]
impl MediaSearchProvider for PixabayProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn search(&self, query: &str, kind: AssetKind, limit: usize) -> ServiceResult<Vec<MediaHit>> {
        let per_page = limit.max(MIN_PER_PAGE).to_string();

        let hits: Vec<MediaHit> = match kind {
            AssetKind::Video => {
                let result: SearchResult<VideoHit> = self
                    .get("/api/videos/", &[("q", query), ("per_page", per_page.as_str())])
                    .await?;
                result
                    .hits
                    .into_iter()
                    .filter_map(|hit| {
                        Some(MediaHit {
                            url: best_rendition(&hit.videos)?,
                            creator: hit.user,
                            tags: split_tags(&hit.tags),
                            source: SOURCE.to_string(),
                            kind,
                        })
                    })
                    .collect()
            }
            AssetKind::Image => {
                let result: SearchResult<ImageHit> = self
                    .get(
                        "/api/",
                        &[
                            ("q", query),
                            ("per_page", per_page.as_str()),
                            ("image_type", "photo"),
                            ("orientation", "vertical"),
                        ],
                    )
                    .await?;
                result
                    .hits
                    .into_iter()
                    .filter_map(|hit| {
                        Some(MediaHit {
                            url: hit.large_image_url.or(hit.webformat_url)?,
                            creator: hit.user,
                            tags: split_tags(&hit.tags),
                            source: SOURCE.to_string(),
                            kind,
                        })
                    })
                    .collect()
            }
        };

        debug!(query, %kind, hits = hits.len(), "Pixabay search");
        Ok(hits.into_iter().take(limit).collect())
    }
}
