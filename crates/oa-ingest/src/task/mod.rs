//! Download task dispatch
//!
//! A source's declared type picks one of a closed set of download
//! strategies. `http` and `ftp` sources are both fetched URL by URL;
//! `esri` sources are paged through a feature layer.

pub mod generic;

use crate::config::IngestContext;
use crate::error::{IngestError, Result};
use crate::esri::EsriDownloadTask;
use oa_common::{OaError, SourceType, TaskKind};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

pub use self::generic::UrlDownloadTask;

/// First 8 hex digits of the SHA-256 of `input`
pub fn short_hash(input: &str) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest[..8].to_string()
}

/// `host[:port]`, with the port only when the URL spells one out
pub fn netloc(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTask {
    Generic(UrlDownloadTask),
    EsriRest(EsriDownloadTask),
}

impl DownloadTask {
    pub fn for_kind(kind: TaskKind, source_prefix: Option<String>) -> Self {
        match kind {
            TaskKind::Generic => DownloadTask::Generic(UrlDownloadTask::new(source_prefix)),
            TaskKind::EsriRest => DownloadTask::EsriRest(EsriDownloadTask::new(source_prefix)),
        }
    }

    pub fn for_source_type(source_type: SourceType, source_prefix: Option<String>) -> Self {
        Self::for_kind(source_type.task_kind(), source_prefix)
    }

    /// Select a task from a declared type string, case-insensitively
    pub fn from_type_string(type_string: &str, source_prefix: Option<String>) -> Result<Self> {
        let source_type: SourceType = type_string.parse().map_err(|e| match e {
            OaError::UnknownSourceType(t) => IngestError::UnknownSourceType(t),
            other => IngestError::Common(other),
        })?;
        Ok(Self::for_source_type(source_type, source_prefix))
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            DownloadTask::Generic(_) => TaskKind::Generic,
            DownloadTask::EsriRest(_) => TaskKind::EsriRest,
        }
    }

    /// Download every URL into `workdir`, returning local paths in input order
    pub async fn download(&self, ctx: &IngestContext, urls: &[String], workdir: &Path) -> Result<Vec<PathBuf>> {
        match self {
            DownloadTask::Generic(task) => task.download(ctx, urls, workdir).await,
            DownloadTask::EsriRest(task) => task.download(ctx, urls, workdir).await,
        }
    }
}
