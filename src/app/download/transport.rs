//! Byte transport used by download workers

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::app::http::ClientConfig;
use crate::errors::{DownloadError, DownloadResult};

/// Open response of one download request
pub struct TransportResponse {
    pub status: u16,
    pub body: BoxStream<'static, DownloadResult<Vec<u8>>>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Anything able to open a product URL as a stream of byte chunks
#[async_trait]
pub trait FileTransport: Send + Sync {
    async fn open(&self, url: &str) -> DownloadResult<TransportResponse>;
}

/// Authenticated HTTP transport against the data broker
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a transport with a streaming client (no overall request timeout)
    pub fn new(token: Option<String>) -> DownloadResult<Self> {
        let client = ClientConfig::default().build_streaming_client()?;
        Ok(Self { client, token })
    }

    pub fn with_client(client: Client, token: Option<String>) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl FileTransport for HttpTransport {
    async fn open(&self, url: &str) -> DownloadResult<TransportResponse> {
        let url = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            error: e.to_string(),
        })?;

        debug!("Opening download stream: {}", url);
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(DownloadError::from))
            .boxed();

        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl<T: FileTransport + ?Sized> FileTransport for std::sync::Arc<T> {
    async fn open(&self, url: &str) -> DownloadResult<TransportResponse> {
        (**self).open(url).await
    }
}
