//! Filename extension resolution for source URLs
//!
//! Many published datasets live behind URLs that say nothing useful about
//! the file (`export.php?id=12`, `download.aspx`). Resolution tries, in
//! order:
//!
//! 1. the URL path itself, when there is no query and the extension is not a
//!    script extension
//! 2. the `Content-Type` of a partial fetch, cross-checked against any
//!    `Content-Disposition` filename
//! 3. sniffing the first bytes of the content

pub mod mime;
pub mod sniff;

use crate::config::IngestContext;
use crate::error::{IngestError, Result};
use regex::Regex;
use std::sync::LazyLock;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

pub use self::mime::extension_for_mime;
pub use self::sniff::sniff_mime;

/// Bytes of content read for sniffing
pub const SAMPLE_SIZE: usize = 99;

/// Path extensions that name a server script rather than the data
const MEANINGLESS_EXTENSIONS: &[&str] = &["", ".cgi", ".php", ".aspx", ".asp", ".do"];

static ATTACHMENT_FILENAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)^attachment;\s*filename=(?:"([^";]+)"|([^;]+))"#).ok());

/// Headers and leading bytes from a partial fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub sample: Vec<u8>,
}

/// Extension of the last path segment, including the dot. Leading dots of
/// the segment do not start an extension.
pub fn path_extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(idx) => &name[stem_start + idx..],
        None => "",
    }
}

/// The path with its extension removed
pub fn strip_extension(path: &str) -> &str {
    &path[..path.len() - path_extension(path).len()]
}

/// The extension a URL's path can be trusted for, if any
pub fn trusted_path_extension(url: &Url) -> Option<&str> {
    if url.query().is_some_and(|q| !q.is_empty()) {
        return None;
    }

    let ext = path_extension(url.path());
    let meaningless = MEANINGLESS_EXTENSIONS
        .iter()
        .any(|bad| bad.eq_ignore_ascii_case(ext));

    (!meaningless).then_some(ext)
}

/// Filename from an `attachment; filename=...` header value
pub fn attachment_filename(content_disposition: &str) -> Option<String> {
    let pattern = ATTACHMENT_FILENAME.as_ref()?;
    let captures = pattern.captures(content_disposition.trim())?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().trim().to_string())
}

/// Decide an extension from probed headers and content.
///
/// A `Content-Disposition` filename that disagrees with the `Content-Type`
/// discards both and defers to sniffing.
pub fn extension_from_probe(probe: &Probe) -> Option<String> {
    let mut ext = None;

    if let Some(content_type) = &probe.content_type {
        ext = extension_for_mime(content_type).map(str::to_string);
        debug!(content_type = %content_type, ext = ?ext, "Content-Type hint");

        if let Some(filename) = probe.content_disposition.as_deref().and_then(attachment_filename) {
            let attachment_ext = path_extension(&filename);
            if ext.as_deref() == Some(attachment_ext) {
                debug!(filename = %filename, "Content-Disposition agrees");
            } else {
                debug!(filename = %filename, "Content-Disposition disagrees");
                ext = None;
            }
        }
    }

    if ext.is_none() {
        let sniffed = sniff_mime(&probe.sample);
        ext = sniffed.and_then(extension_for_mime).map(str::to_string);
        debug!(mime = ?sniffed, ext = ?ext, "sniffed content");
    }

    ext
}

/// Determine a filename extension for `url`.
///
/// Returns `Ok(None)` when nothing could be determined, which callers treat
/// as an empty extension.
pub async fn resolve(ctx: &IngestContext, url: &Url) -> Result<Option<String>> {
    if let Some(ext) = trusted_path_extension(url) {
        debug!(url = %url, ext = %ext, "URL path gives extension");
        return Ok(Some(ext.to_string()));
    }

    let probe = match url.scheme() {
        "http" | "https" => probe_http(ctx, url).await?,
        "file" => probe_file(url).await?,
        scheme => {
            return Err(IngestError::resolution(url, format!("unsupported scheme '{}'", scheme)))
        },
    };

    Ok(extension_from_probe(&probe))
}

async fn probe_http(ctx: &IngestContext, url: &Url) -> Result<Probe> {
    let mut response = ctx
        .client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| IngestError::download(url, e))?;

    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header(reqwest::header::CONTENT_TYPE);
    let content_disposition = header(reqwest::header::CONTENT_DISPOSITION);

    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    while sample.len() < SAMPLE_SIZE {
        match response.chunk().await.map_err(|e| IngestError::download(url, e))? {
            Some(chunk) => {
                let wanted = SAMPLE_SIZE - sample.len();
                sample.extend_from_slice(&chunk[..chunk.len().min(wanted)]);
            },
            None => break,
        }
    }
    // Dropping the response closes the connection without reading the rest

    Ok(Probe {
        content_type,
        content_disposition,
        sample,
    })
}

async fn probe_file(url: &Url) -> Result<Probe> {
    let path = url
        .to_file_path()
        .map_err(|_| IngestError::resolution(url, "not a local file path"))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| IngestError::resolution(url, e))?;

    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)
        .await
        .map_err(|e| IngestError::resolution(url, e))?;

    Ok(Probe {
        sample,
        ..Probe::default()
    })
}
