//! Streaming media downloads.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use adgen_models::AssetKind;

use crate::error::{ServiceError, ServiceResult};

/// Fetches a remote file to a local path.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    ///
    /// On failure no partial file is left at `dest`.
    async fn download(&self, url: &str, dest: &Path) -> ServiceResult<u64>;
}

/// [`MediaDownloader`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    http: Client,
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> ServiceResult<u64> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, body));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(ServiceError::empty(format!("{url} returned an empty body")));
        }
        Ok(written)
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ServiceResult<u64> {
        let result = match tokio::time::timeout(self.timeout, self.stream_to_file(url, dest)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.timeout.as_secs())),
        };

        match &result {
            Ok(bytes) => debug!(url, dest = %dest.display(), bytes, "Downloaded media"),
            Err(e) => {
                warn!(url, error = %e, "Download failed");
                if let Err(rm) = tokio::fs::remove_file(dest).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(dest = %dest.display(), error = %rm, "Could not remove partial download");
                    }
                }
            }
        }

        result
    }
}

/// File extension for a downloaded asset: taken from the URL path when it
/// looks like one, otherwise the kind's default.
pub fn extension_for(url: &str, kind: AssetKind) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let segment = u.path_segments()?.last()?.to_string();
            let (_, ext) = segment.rsplit_once('.')?;
            let ext = ext.to_ascii_lowercase();
            (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .then_some(ext)
        })
        .unwrap_or_else(|| kind.default_extension().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> HttpDownloader {
        HttpDownloader::new(Client::new(), Duration::from_secs(10))
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("https://cdn/x/clip.MP4?token=1", AssetKind::Video), "mp4");
        assert_eq!(extension_for("https://cdn/x/photo.jpeg", AssetKind::Image), "jpeg");
        assert_eq!(extension_for("https://cdn/video-files/123/", AssetKind::Video), "mp4");
        assert_eq!(extension_for("not a url", AssetKind::Image), "jpg");
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 3000]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("assets").join("clip.mp4");
        let bytes = downloader()
            .download(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 3000);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 3000);
    }

    #[tokio::test]
    async fn test_non_success_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing.mp4");
        assert!(downloader()
            .download(&format!("{}/missing.mp4", server.uri()), &dest)
            .await
            .is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("empty.mp4");
        let err = downloader()
            .download(&format!("{}/empty.mp4", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::EmptyResult(_)));
        assert!(!dest.exists());
    }
}
