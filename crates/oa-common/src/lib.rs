//! OpenAddresses Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the OpenAddresses ingestion
//! workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`OaError`] and the [`Result`] alias
//! - **Checksums**: content fingerprints used to detect unchanged downloads
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: source descriptors and cache records exchanged with the
//!   orchestrator between runs
//!
//! # Example
//!
//! ```no_run
//! use oa_common::Result;
//! use oa_common::checksum::Fingerprint;
//!
//! fn report(path: &str) -> Result<()> {
//!     let fingerprint = Fingerprint::from_file(path)?;
//!     tracing::info!(%fingerprint, "fingerprinted {}", path);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use checksum::Fingerprint;
pub use error::{OaError, Result};
pub use types::{CacheRecord, SourceDescriptor, SourceType, TaskKind};
