//! Remote thumbnail fetching.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::extractor::ByteStream;

/// Connect timeout for thumbnail requests. Reads are not bounded.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Opens byte streams for thumbnail URLs.
#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    async fn open(&self, url: &str) -> MediaResult<ByteStream>;
}

/// Plain HTTP(S) thumbnail fetcher.
#[derive(Debug, Clone)]
pub struct HttpThumbnailFetcher {
    client: reqwest::Client,
}

impl HttpThumbnailFetcher {
    pub fn new() -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| MediaError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ThumbnailFetcher for HttpThumbnailFetcher {
    async fn open(&self, url: &str) -> MediaResult<ByteStream> {
        debug!(url = %url, "Fetching thumbnail");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MediaError::stage_io(format!("thumbnail fetch failed: {}", e)))?;

        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(ByteStream::from_reader(StreamReader::new(body)))
    }
}
