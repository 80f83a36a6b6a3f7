//! Plain file downloads over HTTP(S), FTP and `file://`

use super::{netloc, short_hash};
use crate::config::IngestContext;
use crate::error::Result;
use crate::extension::{self, strip_extension};
use crate::fetch::{fetcher_for, parse_source_url};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, Instrument};
use url::Url;

/// Subdirectory of the work directory for plain downloads
pub const HTTP_DIR: &str = "http";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlDownloadTask {
    source_prefix: Option<String>,
}

impl UrlDownloadTask {
    pub fn new(source_prefix: Option<String>) -> Self {
        Self { source_prefix }
    }

    /// Name without extension for a URL's download.
    ///
    /// With a source prefix this is `{prefix}-{hash of host and path}`, which
    /// stays the same between runs. Without one it is the URL's own file name.
    pub fn name_base(&self, url: &Url) -> String {
        let path_base = strip_extension(url.path());

        match &self.source_prefix {
            Some(prefix) => {
                format!("{}-{}", prefix, short_hash(&format!("{}{}", netloc(url), path_base)))
            },
            None => {
                let name = path_base.rsplit('/').next().unwrap_or_default();
                if name.is_empty() {
                    "download".to_string()
                } else {
                    name.to_string()
                }
            },
        }
    }

    /// Local path for a URL's download, resolving its extension
    pub async fn file_path(&self, ctx: &IngestContext, url: &Url, dir: &Path) -> Result<PathBuf> {
        let name_base = self.name_base(url);
        let ext = extension::resolve(ctx, url).await?.unwrap_or_default();
        debug!(url = %url, "Guessed {}{}", name_base, ext);
        Ok(dir.join(format!("{}{}", name_base, ext)))
    }

    /// Download each URL into `{workdir}/http`, in input order.
    ///
    /// Files already present are reused without a request, except local
    /// `file://` sources, which are always copied again.
    pub async fn download(&self, ctx: &IngestContext, urls: &[String], workdir: &Path) -> Result<Vec<PathBuf>> {
        let dir = workdir.join(HTTP_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let mut output = Vec::with_capacity(urls.len());
        for raw in urls {
            let url = parse_source_url(raw)?;
            let span = info_span!("download", url = %url);
            let path = self.download_one(ctx, &url, &dir).instrument(span).await?;
            output.push(path);
        }

        Ok(output)
    }

    async fn download_one(&self, ctx: &IngestContext, url: &Url, dir: &Path) -> Result<PathBuf> {
        let path = self.file_path(ctx, url, dir).await?;

        if url.scheme() != "file" && tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "File exists");
            return Ok(path);
        }

        let fetcher = fetcher_for(url, ctx)?;
        let size = fetcher.fetch(url, &path).await?;
        info!(bytes = size, path = %path.display(), "Downloaded");

        Ok(path)
    }
}
