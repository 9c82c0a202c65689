//! Streamed HTTP byte fetches for artwork and other plain assets.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use super::{ArtFetcher, PacingOptions, ProviderError};

/// Reqwest-backed [`ArtFetcher`] with jittered inter-request pacing.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    pacing: Option<PacingOptions>,
}

impl HttpFetcher {
    /// Creates a fetcher with no pacing (tests, local mirrors).
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            pacing: None,
        }
    }

    /// Creates a fetcher that sleeps a jittered interval inside the given
    /// window before each remote request.
    #[must_use]
    pub fn with_pacing(pacing: PacingOptions) -> Self {
        Self {
            client: Client::new(),
            pacing: Some(pacing),
        }
    }

    async fn pace(&self) {
        let Some(pacing) = self.pacing else { return };
        if pacing.max_sleep_secs == 0 {
            return;
        }
        // ThreadRng is not Send; pick the jitter before awaiting.
        let secs = {
            let mut rng = rand::thread_rng();
            rng.gen_range(pacing.min_sleep_secs..=pacing.max_sleep_secs)
        };
        debug!(sleep_secs = secs, "pacing before request");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtFetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    async fn fetch_bytes(&self, url: &str, dest: &Path) -> Result<(), ProviderError> {
        if dest.exists() {
            debug!("destination already exists, skipping fetch");
            return Ok(());
        }

        self.pace().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let file = File::create(dest).await.map_err(|source| ProviderError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        if let Err(error) = stream_to_file(file, response, url, dest).await {
            // Do not leave partial artwork behind; a later run should retry.
            let _ = tokio::fs::remove_file(dest).await;
            return Err(error);
        }

        Ok(())
    }
}

/// Streams the response body to the destination file and flushes it.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    dest: &Path,
) -> Result<(), ProviderError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|source| ProviderError::Network {
            url: url.to_string(),
            source,
        })?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|source| ProviderError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
    }

    writer.flush().await.map_err(|source| ProviderError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_bytes_writes_body_to_dest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cover.jpg");

        let fetcher = HttpFetcher::new();
        fetcher
            .fetch_bytes(&format!("{}/cover.jpg", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_fetch_bytes_noop_when_dest_exists() {
        let server = MockServer::start().await;
        // No mock mounted: any request would 404 and fail the call.

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cover.jpg");
        std::fs::write(&dest, b"already here").unwrap();

        let fetcher = HttpFetcher::new();
        fetcher
            .fetch_bytes(&format!("{}/cover.jpg", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_fetch_bytes_http_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.jpg");

        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch_bytes(&format!("{}/missing.jpg", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::HttpStatus { status: 404, .. }));
        assert!(!dest.exists());
    }
}
