use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use adgen_models::AssetKind;

use super::{MediaHit, MediaSearchProvider};
use crate::error::{ServiceError, ServiceResult};

const SOURCE: &str = "pexels";

#[derive(Debug, Deserialize)]
struct VideoSearch {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    user: PexelsUser,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsUser {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: String,
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PhotoSearch {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    #[serde(default)]
    photographer: String,
    #[serde(default)]
    alt: Option<String>,
    src: PhotoSources,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    #[serde(default)]
    portrait: Option<String>,
    #[serde(default)]
    large2x: Option<String>,
    #[serde(default)]
    original: Option<String>,
}

/// Pexels video and photo search. Videos carry no tags; photo tags come
/// from the alt text.
pub struct PexelsProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

impl PexelsProvider {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &str, limit: usize) -> ServiceResult<T> {
        let per_page = limit.max(1).to_string();
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", "portrait"),
            ])
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

/// Prefer an mp4 rendition, the tallest up to 1920 px.
fn best_video_file(files: &[VideoFile]) -> Option<&VideoFile> {
    let mp4 = |f: &&VideoFile| f.file_type.as_deref().map_or(true, |t| t == "video/mp4");
    files
        .iter()
        .filter(mp4)
        .filter(|f| f.height.unwrap_or(0) <= 1920)
        .max_by_key(|f| (f.height.unwrap_or(0), f.width.unwrap_or(0)))
        .or_else(|| files.iter().find(mp4))
}

/// Alt text words as lowercase tags.
fn alt_tags(alt: Option<&str>) -> Vec<String> {
    alt.unwrap_or_default()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl MediaSearchProvider for PexelsProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn search(&self, query: &str, kind: AssetKind, limit: usize) -> ServiceResult<Vec<MediaHit>> {
        let hits: Vec<MediaHit> = match kind {
            AssetKind::Video => {
                let result: VideoSearch = self.get("/videos/search", query, limit).await?;
                result
                    .videos
                    .into_iter()
                    .filter_map(|video| {
                        let file = best_video_file(&video.video_files)?;
                        Some(MediaHit {
                            url: file.link.clone(),
                            creator: video.user.name.clone(),
                            tags: Vec::new(),
                            source: SOURCE.to_string(),
                            kind,
                        })
                    })
                    .collect()
            }
            AssetKind::Image => {
                let result: PhotoSearch = self.get("/v1/search", query, limit).await?;
                result
                    .photos
                    .into_iter()
                    .filter_map(|photo| {
                        let url = photo.src.portrait.or(photo.src.large2x).or(photo.src.original)?;
                        Some(MediaHit {
                            url,
                            tags: alt_tags(photo.alt.as_deref()),
                            creator: photo.photographer,
                            source: SOURCE.to_string(),
                            kind,
                        })
                    })
                    .collect()
            }
        };

        debug!(query, %kind, hits = hits.len(), "Pexels search");
        Ok(hits.into_iter().take(limit).collect())
    }
}
