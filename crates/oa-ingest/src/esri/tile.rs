//! Recursive spatial paging
//!
//! A layer query returns at most `maxRecordCount` features and offers no
//! cursor. A tile whose query comes back full is split into four at the mean
//! position of the rows it returned, and each quadrant is queried in turn.
//! Features on tile boundaries come back more than once; the object ids seen
//! so far decide which copy is kept.

use super::extent::BoundingBox;
use super::geometry::{self, COORDINATE_PRECISION};
use super::metadata::{ErrorBody, LayerMetadata};
use crate::config::IngestContext;
use crate::error::{GeometryError, IngestError, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

/// Object id rendered as text so numeric and string ids share one set
pub type ObjectId = String;

/// One retained feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub object_id: ObjectId,
    pub attributes: Map<String, Value>,
    pub x: f64,
    pub y: f64,
    pub wkt: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("feature has no object id")]
    MissingObjectId,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// What happened to a single returned feature
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Kept(FeatureRow),
    /// Already emitted from another tile
    Duplicate,
    Skipped(SkipReason),
}

/// State shared by every tile of one layer download
#[derive(Debug, Default)]
pub struct Traversal {
    pub ids_seen: HashSet<ObjectId>,
    pub queries: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    geometry_type: Option<String>,
    #[serde(default)]
    features: Option<Vec<Feature>>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

/// Features of one successful query
struct Page {
    geometry_type: String,
    features: Vec<Feature>,
}

/// Pages through one layer's `/query` endpoint
pub struct TileFetcher<'a> {
    ctx: &'a IngestContext,
    layer: &'a LayerMetadata,
    query_url: Url,
}

impl<'a> TileFetcher<'a> {
    pub fn new(ctx: &'a IngestContext, layer_url: &Url, layer: &'a LayerMetadata) -> Result<Self> {
        Ok(Self {
            ctx,
            layer,
            query_url: query_url(layer_url)?,
        })
    }

    /// Fetch every feature inside `bbox`, subdividing while pages come back
    /// full. Rows are returned parent first, then quadrants in order.
    pub fn fetch<'b>(
        &'b self,
        traversal: &'b mut Traversal,
        bbox: BoundingBox,
        depth: u32,
    ) -> BoxFuture<'b, Result<Vec<FeatureRow>>> {
        let span = info_span!("tile", depth, bbox = %bbox);
        async move {
            let page = self.query_with_retry(&bbox).await?;
            traversal.queries += 1;
            let returned = page.features.len();
            debug!(bbox = %bbox, count = returned, "tile query");

            let mut rows = Vec::new();
            for feature in page.features {
                match self.accept(traversal, &page.geometry_type, feature) {
                    RowOutcome::Kept(row) => rows.push(row),
                    RowOutcome::Duplicate => traversal.duplicates += 1,
                    RowOutcome::Skipped(reason) => {
                        debug!(reason = %reason, "skipping feature");
                        traversal.skipped += 1;
                    },
                }
            }

            if returned < self.layer.max_record_count {
                return Ok(rows);
            }

            if depth >= self.ctx.config.max_tile_depth {
                warn!(
                    bbox = %bbox,
                    depth,
                    "tile still full at maximum depth, features may be missing"
                );
                return Ok(rows);
            }

            let (px, py) = pivot(&rows).unwrap_or_else(|| {
                debug!("no new rows in a full tile, splitting at its center");
                bbox.center()
            });

            for quadrant in bbox.quadrants(px, py) {
                let children = self.fetch(traversal, quadrant, depth + 1).await?;
                rows.extend(children);
            }

            Ok(rows)
        }
        .instrument(span)
        .boxed()
    }

    fn accept(&self, traversal: &mut Traversal, geometry_type: &str, feature: Feature) -> RowOutcome {
        let attributes = feature.attributes.unwrap_or_default();

        let object_id = match attributes.get(&self.layer.object_id_field).and_then(object_id) {
            Some(id) => id,
            None => return RowOutcome::Skipped(SkipReason::MissingObjectId),
        };

        if traversal.ids_seen.contains(&object_id) {
            return RowOutcome::Duplicate;
        }
        // Skipped features are also marked seen so they are counted once
        traversal.ids_seen.insert(object_id.clone());

        match geometry::locate(geometry_type, feature.geometry.as_ref()) {
            Ok(located) => RowOutcome::Kept(FeatureRow {
                object_id,
                attributes,
                x: located.x,
                y: located.y,
                wkt: located.wkt,
            }),
            Err(e) => RowOutcome::Skipped(e.into()),
        }
    }

    async fn query_with_retry(&self, bbox: &BoundingBox) -> Result<Page> {
        let policy = self.ctx.config.retry;
        let mut attempt = 1;

        loop {
            match self.query(bbox).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < policy.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "tile query failed, retrying"
                    );
                    tokio::time::sleep(policy.delay()).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn query(&self, bbox: &BoundingBox) -> Result<Page> {
        let url = &self.query_url;
        let geometry = bbox.to_envelope_param();
        let precision = COORDINATE_PRECISION.to_string();

        let response = self
            .ctx
            .client
            .get(url.clone())
            .query(&[
                ("f", "json"),
                ("geometryType", "esriGeometryEnvelope"),
                ("geometry", geometry.as_str()),
                ("geometryPrecision", precision.as_str()),
                ("returnGeometry", "true"),
                ("outSR", "4326"),
                ("inSR", "4326"),
                ("outFields", "*"),
            ])
            .send()
            .await
            .map_err(|e| IngestError::download(url, format!("could not connect: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(IngestError::http_status(url, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::download(url, e))?;
        let parsed: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| IngestError::download(url, format!("problem parsing query response: {}", e)))?;

        if let Some(error) = parsed.error {
            return Err(IngestError::download(
                url,
                format!("problem querying layer: {}", error.describe()),
            ));
        }

        let features = parsed
            .features
            .ok_or_else(|| IngestError::download(url, "query response has no features"))?;

        Ok(Page {
            geometry_type: parsed
                .geometry_type
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| self.layer.geometry_type.clone()),
            features,
        })
    }
}

/// The layer's `/query` endpoint
pub fn query_url(layer_url: &Url) -> Result<Url> {
    let mut url = layer_url.clone();
    url.path_segments_mut()
        .map_err(|_| IngestError::download(layer_url, "layer URL cannot have a path"))?
        .pop_if_empty()
        .push("query");
    Ok(url)
}

/// Mean position of the rows
fn pivot(rows: &[FeatureRow]) -> Option<(f64, f64)> {
    if rows.is_empty() {
        return None;
    }
    let n = rows.len() as f64;
    let (sx, sy) = rows.iter().fold((0.0, 0.0), |(sx, sy), r| (sx + r.x, sy + r.y));
    Some((sx / n, sy / n))
}

fn object_id(value: &Value) -> Option<ObjectId> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
