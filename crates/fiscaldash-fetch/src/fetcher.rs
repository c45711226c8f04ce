//! Byte-level transports for CSV sources.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::FetchError;

/// Characters of a failed response body kept in [`FetchError::Server`].
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Something that can fetch the raw bytes of a source location.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Whether a location should go over the network.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// HTTP(S) fetcher for published spreadsheet exports.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        info!(url = %url, "fetching source");
        let resp = self.client.get(url).send().await.map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                url: url.to_string(),
                status: status.as_u16(),
                body: body_excerpt(&body),
            });
        }

        let bytes = resp.bytes().await.map_err(http_err)?;
        info!(url = %url, bytes = bytes.len(), "fetched source");
        Ok(bytes.to_vec())
    }
}

/// Error pages can be whole HTML documents; keep only the start.
fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Local file fetcher. Accepts plain paths and `file://` URLs.
#[derive(Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        info!(path = %path.display(), "reading source");
        tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Routes `http(s)://` locations to [`HttpFetcher`] and everything else to
/// [`FileFetcher`].
#[derive(Default)]
pub struct SourceFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SourceFetcher {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            file: FileFetcher,
        }
    }
}

#[async_trait]
impl Fetch for SourceFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if is_remote(location) {
            self.http.fetch(location).await
        } else {
            self.file.fetch(location).await
        }
    }
}
