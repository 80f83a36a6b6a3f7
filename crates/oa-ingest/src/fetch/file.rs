//! Local `file://` sources

use super::{persist, staging_file, Fetcher};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;
use url::Url;

/// Copies a local file
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64> {
        let source = url
            .to_file_path()
            .map_err(|_| IngestError::download(url, "not a local file path"))?;

        let staged = staging_file(destination)?;
        let size = tokio::fs::copy(&source, staged.path())
            .await
            .map_err(|e| IngestError::download(url, e))?;
        persist(staged, destination)?;

        debug!(source = %source.display(), bytes = size, "Copied local source");
        Ok(size)
    }
}
