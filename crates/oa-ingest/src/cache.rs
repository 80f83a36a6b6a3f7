//! Content-addressed result store
//!
//! A fresh artifact is fingerprinted and compared with what the previous run
//! recorded. Unchanged content that is already published over `http` keeps
//! its old reference. Anything else is moved into a flat store directory
//! under its own file name.

use crate::error::{IngestError, Result};
use oa_common::{CacheRecord, Fingerprint};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Where an artifact ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub cache: Url,
    pub fingerprint: String,
    /// False when the prior record was reused and the store left untouched
    pub promoted: bool,
}

/// Fingerprint `artifact` and either reuse `declared` or promote the file
/// into `store_dir`.
///
/// Only a declared reference with the `http` scheme is ever reused; the
/// artifact is then left where it is for the caller to discard.
pub fn reconcile(artifact: &Path, store_dir: &Path, declared: Option<&CacheRecord>) -> Result<Reconciled> {
    if !artifact.is_file() {
        return Err(IngestError::MissingArtifact(artifact.to_path_buf()));
    }

    let fingerprint = Fingerprint::from_file(artifact)?;

    if let Some(prior) = declared {
        if prior.cache.scheme() == "http" && fingerprint.matches(&prior.fingerprint) {
            info!(cache = %prior.cache, fingerprint = %fingerprint, "Content unchanged, keeping published cache");
            return Ok(Reconciled {
                cache: prior.cache.clone(),
                fingerprint: prior.fingerprint.clone(),
                promoted: false,
            });
        }
    }

    let name = artifact
        .file_name()
        .ok_or_else(|| IngestError::MissingArtifact(artifact.to_path_buf()))?;

    std::fs::create_dir_all(store_dir)?;
    let store_dir = std::path::absolute(store_dir)?;
    let target = store_dir.join(name);

    if target.is_file() {
        if Fingerprint::from_file(&target)? == fingerprint {
            debug!(path = %target.display(), "Identical content already stored");
            std::fs::remove_file(artifact)?;
        } else {
            warn!(path = %target.display(), "Replacing stored artifact with different content");
            promote(artifact, &target)?;
        }
    } else {
        promote(artifact, &target)?;
    }

    let cache = Url::from_file_path(&target).map_err(|_| {
        IngestError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("cannot express {} as a file URL", target.display()),
        ))
    })?;

    info!(cache = %cache, fingerprint = %fingerprint, "Cached");

    Ok(Reconciled {
        cache,
        fingerprint: fingerprint.to_string(),
        promoted: true,
    })
}

/// Move by rename, copying across filesystems when rename cannot
fn promote(artifact: &Path, target: &Path) -> Result<PathBuf> {
    if std::fs::rename(artifact, target).is_ok() {
        return Ok(target.to_path_buf());
    }

    let staged = crate::fetch::staging_file(target)?;
    std::fs::copy(artifact, staged.path())?;
    crate::fetch::persist(staged, target)?;
    std::fs::remove_file(artifact)?;

    Ok(target.to_path_buf())
}
