//! OpenAddresses source acquisition
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Fetches the data behind a source definition into a single local artifact
//! and fingerprints it so unchanged data is recognised on the next run.
//!
//! # Source types
//!
//! - **http** / **ftp**: files fetched URL by URL, named from the URL and a
//!   resolved extension
//! - **esri**: ArcGIS REST feature layers, paged spatially and written to CSV
//!
//! # Example
//!
//! ```no_run
//! use oa_ingest::{AcquisitionSession, IngestConfig, IngestContext};
//! use oa_common::{SourceDescriptor, SourceType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = IngestContext::new(IngestConfig::from_env()?)?;
//!     let source = SourceDescriptor::new(
//!         SourceType::Http,
//!         vec!["http://data.example.com/addresses.zip".to_string()],
//!     )
//!     .with_prefix("us-xx-example");
//!
//!     let result = AcquisitionSession::new(&ctx, "./out").acquire(&source).await?;
//!     println!("{} {}", result.cache, result.fingerprint);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod esri;
pub mod extension;
pub mod fetch;
pub mod session;
pub mod task;

pub use config::{IngestConfig, IngestContext};
pub use error::{IngestError, Result};
pub use session::{cache_source, AcquisitionSession, CacheResult};
pub use task::DownloadTask;
