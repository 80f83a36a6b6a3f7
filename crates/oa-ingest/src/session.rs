//! One source, one acquisition
//!
//! A session owns a scratch directory under the destination directory for
//! the lifetime of a single acquisition, runs the source's download task into
//! it and hands the first artifact to the cache. The scratch directory is
//! removed when the session finishes, whether or not it succeeded.

use crate::cache::{self, Reconciled};
use crate::config::IngestContext;
use crate::error::{IngestError, Result};
use crate::task::DownloadTask;
use oa_common::{CacheRecord, OaError, SourceDescriptor};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};
use url::Url;

/// Prefix of per-acquisition scratch directories
pub const SCRATCH_PREFIX: &str = "cache-";

/// Outcome of a successful acquisition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheResult {
    pub cache: Url,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl CacheResult {
    /// The record a caller persists for the next run
    pub fn record(&self) -> CacheRecord {
        CacheRecord::new(self.cache.clone(), self.fingerprint.clone(), self.version.clone())
    }
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

pub struct AcquisitionSession<'a> {
    ctx: &'a IngestContext,
    destdir: PathBuf,
}

impl<'a> AcquisitionSession<'a> {
    pub fn new(ctx: &'a IngestContext, destdir: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            destdir: destdir.into(),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.destdir.join(&self.ctx.config.store_dir_name)
    }

    pub async fn acquire(&self, source: &SourceDescriptor) -> Result<CacheResult> {
        let span = info_span!(
            "source",
            source = source.source_prefix.as_deref().unwrap_or("-"),
            source_type = %source.source_type,
        );
        self.run(source).instrument(span).await
    }

    async fn run(&self, source: &SourceDescriptor) -> Result<CacheResult> {
        let start = Instant::now();

        if source.urls.is_empty() {
            return Err(IngestError::EmptySource);
        }

        tokio::fs::create_dir_all(&self.destdir).await?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.destdir)?;

        let task = DownloadTask::for_source_type(source.source_type, source.source_prefix.clone());
        let mut files = task.download(self.ctx, &source.urls, scratch.path()).await?;

        if files.is_empty() {
            return Err(IngestError::EmptySource);
        }
        if files.len() > 1 {
            let ignored: Vec<String> = files[1..].iter().map(|p| p.display().to_string()).collect();
            warn!(ignored = ?ignored, "Source produced several files, caching only the first");
        }
        let artifact = files.swap_remove(0);

        let reconciled = reconcile_blocking(artifact, self.store_dir(), source.prior.clone()).await?;

        let result = CacheResult {
            cache: reconciled.cache,
            fingerprint: reconciled.fingerprint,
            version: source.version.clone(),
            elapsed: start.elapsed(),
        };

        info!(
            cache = %result.cache,
            fingerprint = %result.fingerprint,
            reused = !reconciled.promoted,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Acquisition complete"
        );

        Ok(result)
    }
}

/// Hashing large artifacts blocks, so keep it off the async workers
async fn reconcile_blocking(artifact: PathBuf, store_dir: PathBuf, prior: Option<CacheRecord>) -> Result<Reconciled> {
    tokio::task::spawn_blocking(move || cache::reconcile(&artifact, &store_dir, prior.as_ref()))
        .await
        .map_err(|e| IngestError::Io(std::io::Error::other(e)))?
}

/// Read a source JSON file and acquire it into `destdir`.
///
/// The file stem names the source. A `prior` record, when given, replaces any
/// cache details stored in the file itself.
pub async fn cache_source(
    ctx: &IngestContext,
    source_path: &Path,
    destdir: &Path,
    prior: Option<CacheRecord>,
) -> Result<CacheResult> {
    let text = tokio::fs::read_to_string(source_path).await?;
    let value: serde_json::Value = serde_json::from_str(&text)?;

    let prefix = source_path.file_stem().and_then(|s| s.to_str());
    let mut source = SourceDescriptor::from_json(&value, prefix).map_err(|e| match e {
        OaError::UnknownSourceType(t) => IngestError::UnknownSourceType(t),
        other => IngestError::Common(other),
    })?;

    if prior.is_some() {
        source = source.with_prior(prior);
    }

    AcquisitionSession::new(ctx, destdir).acquire(&source).await
}
