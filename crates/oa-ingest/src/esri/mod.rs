//! ESRI feature layer downloads
//!
//! MapServer and FeatureServer layers are read through their REST query
//! endpoint and flattened into one CSV per layer URL:
//!
//! 1. fetch the layer description (`?f=json`) for fields, object id, geometry
//!    type, page size and extent
//! 2. reproject the extent to WGS84
//! 3. page through the extent with [`tile::TileFetcher`]
//! 4. write attributes plus `X`, `Y` and `OA:geom` columns

pub mod extent;
pub mod geometry;
pub mod metadata;
pub mod tile;
pub mod writer;

use crate::config::IngestContext;
use crate::error::Result;
use crate::fetch::parse_source_url;
use crate::task::{netloc, short_hash};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, Instrument};
use url::Url;

pub use self::extent::BoundingBox;
pub use self::metadata::{fetch_metadata, LayerMetadata};
pub use self::tile::{FeatureRow, RowOutcome, TileFetcher, Traversal};

/// Subdirectory of the work directory for layer downloads
pub const ESRI_DIR: &str = "esri";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EsriDownloadTask {
    source_prefix: Option<String>,
}

impl EsriDownloadTask {
    pub fn new(source_prefix: Option<String>) -> Self {
        Self { source_prefix }
    }

    /// `{prefix}-{hash}.csv`, falling back to `host[:port]` when there is no
    /// source prefix
    pub fn file_name(&self, url: &Url) -> String {
        let host = netloc(url);
        let hash = short_hash(&format!("{}{}", host, url.path()));
        let base = self.source_prefix.as_deref().unwrap_or(&host);
        format!("{}-{}.csv", base, hash)
    }

    /// Download each layer to one CSV, in input order
    pub async fn download(&self, ctx: &IngestContext, urls: &[String], workdir: &Path) -> Result<Vec<PathBuf>> {
        let dir = workdir.join(ESRI_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let mut output = Vec::with_capacity(urls.len());
        for raw in urls {
            let url = parse_source_url(raw)?;
            let path = dir.join(self.file_name(&url));

            if tokio::fs::try_exists(&path).await? {
                debug!(path = %path.display(), "File exists");
                output.push(path);
                continue;
            }

            let span = info_span!("layer", url = %url);
            download_layer(ctx, &url, &path).instrument(span).await?;
            output.push(path);
        }

        Ok(output)
    }
}

/// Harvest one layer into a CSV at `path`
pub async fn download_layer(ctx: &IngestContext, layer_url: &Url, path: &Path) -> Result<usize> {
    let layer = fetch_metadata(ctx, layer_url).await?;
    let fetcher = TileFetcher::new(ctx, layer_url, &layer)?;

    let mut traversal = Traversal::default();
    let rows = fetcher.fetch(&mut traversal, layer.extent, 0).await?;
    let written = writer::write_csv(path, &layer.field_names, &rows)?;

    info!(
        features = written,
        queries = traversal.queries,
        duplicates = traversal.duplicates,
        skipped = traversal.skipped,
        path = %path.display(),
        "Downloaded ESRI features"
    );

    Ok(written)
}
