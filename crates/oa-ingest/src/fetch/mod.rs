//! Transfer clients
//!
//! A [`Fetcher`] copies the resource behind one URL to a local path. The
//! implementation is picked by URL scheme with [`fetcher_for`].
//!
//! Every fetcher stages bytes in a temporary file beside the destination and
//! renames it into place once the transfer has finished, so a file at the
//! destination path is always complete.

pub mod file;
pub mod ftp;
pub mod http;

use crate::config::IngestContext;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::Path;
use tempfile::NamedTempFile;
use url::Url;

pub use self::file::FileFetcher;
pub use self::ftp::FtpFetcher;
pub use self::http::HttpFetcher;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Transfer `url` to `destination`, returning the number of bytes written
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64>;
}

/// Pick the transfer client for a URL's scheme
pub fn fetcher_for(url: &Url, ctx: &IngestContext) -> Result<Box<dyn Fetcher>> {
    match url.scheme() {
        "http" | "https" => Ok(Box::new(HttpFetcher::new(ctx.client.clone()))),
        "ftp" => Ok(Box::new(FtpFetcher::new(
            ctx.config.ftp_username.clone(),
            ctx.config.ftp_password.clone(),
            ctx.config.http_timeout(),
        ))),
        "file" => Ok(Box::new(FileFetcher)),
        scheme => Err(IngestError::download(url, format!("unsupported scheme '{}'", scheme))),
    }
}

/// Parse a source URL. Anything that is not an absolute URL is taken as a
/// local path, relative to the working directory.
pub fn parse_source_url(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = std::path::absolute(raw)?;
            Url::from_file_path(&path)
                .map_err(|_| IngestError::download(raw, "not a usable local path"))
        },
        Err(e) => Err(e.into()),
    }
}

/// Temporary file in the destination's directory
pub(crate) fn staging_file(destination: &Path) -> Result<NamedTempFile> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(tempfile::Builder::new().prefix(".partial-").tempfile_in(dir)?)
}

/// Move a finished staging file onto the destination path
pub(crate) fn persist(staged: NamedTempFile, destination: &Path) -> Result<()> {
    staged.persist(destination).map_err(|e| IngestError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;

    #[test]
    fn test_parse_source_url() {
        let url = parse_source_url("https://example.com/a.zip").unwrap();
        assert_eq!(url.scheme(), "https");

        let local = parse_source_url("tests/data/a.csv").unwrap();
        assert_eq!(local.scheme(), "file");
        assert!(local.path().ends_with("/tests/data/a.csv"));
    }

    #[test]
    fn test_fetcher_for_rejects_unknown_scheme() {
        let ctx = IngestContext::new(IngestConfig::default()).unwrap();

        for ok in ["http://a/b", "https://a/b", "ftp://a/b", "file:///a/b"] {
            assert!(fetcher_for(&Url::parse(ok).unwrap(), &ctx).is_ok(), "{}", ok);
        }

        let err = fetcher_for(&Url::parse("s3://bucket/key").unwrap(), &ctx).err().unwrap();
        assert!(err.to_string().contains("unsupported scheme 's3'"));
    }

    #[test]
    fn test_staging_file_lives_beside_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.csv");

        let staged = staging_file(&destination).unwrap();
        assert_eq!(staged.path().parent(), Some(dir.path()));

        std::fs::write(staged.path(), b"x").unwrap();
        persist(staged, &destination).unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"x");
    }
}
