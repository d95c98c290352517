//! HTTP transport collaborator.
//!
//! Two operations cover the whole wire contract: fetching a small JSON
//! document as text (`chcp.json`, `chcp.manifest`) and streaming a bundle
//! file to local storage. Caller-supplied headers are passed through
//! unchanged on both.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::{CodeSwapError, Result};

/// Header map sent with every request to the update/content server.
pub type Headers = BTreeMap<String, String>;

/// Network primitives the update engine is built on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the response body as text.
    async fn get_text(&self, url: &str, headers: &Headers) -> Result<String>;

    /// GET `url` and stream the response body into the file at `dest`.
    /// The destination parent directory must already exist.
    async fn download(&self, url: &str, headers: &Headers, dest: &Path) -> Result<()>;
}

/// [`Transport`] over a shared [`reqwest::Client`].
#[derive(Debug, Default, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn request(&self, url: &str, headers: &Headers) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }
}

fn transport_error(url: &str, err: impl std::fmt::Display) -> CodeSwapError {
    CodeSwapError::TransportError {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

fn download_error(url: &str, err: impl std::fmt::Display) -> CodeSwapError {
    CodeSwapError::DownloadError {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str, headers: &Headers) -> Result<String> {
        let response = self
            .request(url, headers)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| transport_error(url, err))?;
        response.text().await.map_err(|err| transport_error(url, err))
    }

    async fn download(&self, url: &str, headers: &Headers, dest: &Path) -> Result<()> {
        debug!(url, dest = %dest.display(), "downloading file");
        let response = self
            .request(url, headers)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| download_error(url, err))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|err| download_error(url, err))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| download_error(url, err))?;
            file.write_all(&chunk).await.map_err(|err| download_error(url, err))?;
        }
        file.flush().await.map_err(|err| download_error(url, err))?;
        Ok(())
    }
}
