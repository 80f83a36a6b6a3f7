//! Streamed HTTP(S) downloads

use super::{persist, staging_file, Fetcher};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// The client carries the configured timeout and user agent
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64> {
        info!(url = %url, "Requesting");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IngestError::download(url, format!("could not connect: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::http_status(url, status));
        }

        let staged = staging_file(destination)?;
        let mut file = tokio::fs::File::from_std(staged.reopen()?);
        let mut size = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| IngestError::download(url, e))?
        {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        persist(staged, destination)?;
        debug!(url = %url, bytes = size, path = %destination.display(), "Downloaded");

        Ok(size)
    }
}
