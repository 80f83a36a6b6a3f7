//! Layer schema and extent

use super::extent::{to_wgs84, BoundingBox, SpatialReference, WGS84};
use crate::config::IngestContext;
use crate::error::{IngestError, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

pub const X_FIELD: &str = "X";
pub const Y_FIELD: &str = "Y";
pub const GEOM_FIELD: &str = "OA:geom";

/// Page size assumed when the layer does not declare one
pub const DEFAULT_MAX_RECORD_COUNT: usize = 500;

const OBJECT_ID_FIELD_TYPE: &str = "esriFieldTypeOID";

/// What is needed to page through one feature layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMetadata {
    /// Layer fields in server order, followed by the derived columns the
    /// layer does not already have
    pub field_names: Vec<String>,
    pub object_id_field: String,
    pub geometry_type: String,
    pub max_record_count: usize,
    /// Layer extent in WGS84
    pub extent: BoundingBox,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn describe(&self) -> String {
        match (&self.message, self.code) {
            (Some(message), _) => message.clone(),
            (None, Some(code)) => format!("error code {}", code),
            (None, None) => "unspecified error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExtent {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    #[serde(rename = "spatialReference", default)]
    spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    fields: Option<Vec<RawField>>,
    #[serde(default)]
    geometry_type: Option<String>,
    #[serde(default)]
    max_record_count: Option<i64>,
    #[serde(default)]
    extent: Option<RawExtent>,
}

/// GET the layer root with `f=json` and validate what it describes
pub async fn fetch_metadata(ctx: &IngestContext, layer_url: &Url) -> Result<LayerMetadata> {
    let response = ctx
        .client
        .get(layer_url.clone())
        .query(&[("f", "json")])
        .send()
        .await
        .map_err(|e| IngestError::download(layer_url, format!("could not connect: {}", e)))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(IngestError::http_status(layer_url, status));
    }

    let body = response
        .text()
        .await
        .map_err(|e| IngestError::download(layer_url, e))?;
    let value: Value = serde_json::from_str(&body).map_err(|e| {
        IngestError::download(layer_url, format!("layer metadata is not JSON: {}", e))
    })?;

    parse_metadata(layer_url, value)
}

/// Validate a layer description and reproject its extent
pub fn parse_metadata(layer_url: &Url, value: Value) -> Result<LayerMetadata> {
    let raw: RawMetadata = serde_json::from_value(value).map_err(|e| {
        IngestError::download(layer_url, format!("unexpected layer metadata: {}", e))
    })?;

    if let Some(error) = raw.error {
        return Err(IngestError::download(
            layer_url,
            format!("problem querying layer: {}", error.describe()),
        ));
    }

    let fields = match raw.fields {
        Some(fields) if !fields.is_empty() => fields,
        _ => return Err(IngestError::download(layer_url, "no fields available in the source")),
    };

    let object_id_field = fields
        .iter()
        .find(|f| f.field_type.as_deref() == Some(OBJECT_ID_FIELD_TYPE))
        .map(|f| f.name.clone())
        .ok_or_else(|| IngestError::download(layer_url, "could not find object id field"))?;

    let geometry_type = raw
        .geometry_type
        .filter(|g| !g.is_empty())
        .ok_or_else(|| IngestError::download(layer_url, "could not determine geometry type"))?;

    let raw_extent = raw
        .extent
        .ok_or_else(|| IngestError::download(layer_url, "layer has no extent"))?;

    let max_record_count = match raw.max_record_count {
        Some(n) if n > 0 => n as usize,
        _ => DEFAULT_MAX_RECORD_COUNT,
    };

    let mut field_names: Vec<String> = fields.into_iter().map(|f| f.name).collect();
    for derived in [X_FIELD, Y_FIELD, GEOM_FIELD] {
        if !field_names.iter().any(|name| name == derived) {
            field_names.push(derived.to_string());
        }
    }

    let native = BoundingBox::new(raw_extent.xmin, raw_extent.ymin, raw_extent.xmax, raw_extent.ymax);
    let epsg = match raw_extent.spatial_reference.and_then(|sr| sr.epsg_code()) {
        Some(code) => code,
        None => {
            warn!(url = %layer_url, "extent has no spatial reference, assuming WGS84");
            u32::from(WGS84)
        },
    };
    let extent = to_wgs84(&native, epsg).map_err(|reason| IngestError::download(layer_url, reason))?;

    debug!(
        url = %layer_url,
        fields = field_names.len(),
        object_id_field = %object_id_field,
        geometry_type = %geometry_type,
        max_record_count,
        extent = %extent,
        "layer metadata"
    );

    Ok(LayerMetadata {
        field_names,
        object_id_field,
        geometry_type,
        max_record_count,
        extent,
    })
}
