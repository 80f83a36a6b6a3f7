//! Shared fixtures for the acquisition integration tests
//!
//! Provides a fast-retrying [`IngestContext`] and builders for the ArcGIS
//! REST payloads served by `wiremock`.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use oa_ingest::config::RetryPolicy;
use oa_ingest::{IngestConfig, IngestContext};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LAYER_PATH: &str = "/arcgis/rest/services/Addresses/MapServer/0";

pub fn query_path() -> String {
    format!("{}/query", LAYER_PATH)
}

/// Context with a short retry delay so retry tests finish quickly
pub fn test_context() -> IngestContext {
    let config = IngestConfig {
        http_timeout_secs: 10,
        retry: RetryPolicy {
            max_attempts: 3,
            delay_ms: 10,
        },
        ..IngestConfig::default()
    };
    IngestContext::new(config).expect("Failed to build test context")
}

pub fn layer_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), LAYER_PATH)
}

/// Layer description with an object id, a street number and a WGS84 extent
pub fn layer_metadata(geometry_type: &str, max_record_count: i64, extent: [f64; 4]) -> Value {
    json!({
        "name": "Addresses",
        "geometryType": geometry_type,
        "maxRecordCount": max_record_count,
        "fields": [
            {"name": "OBJECTID", "type": "esriFieldTypeOID"},
            {"name": "NUMBER", "type": "esriFieldTypeString"}
        ],
        "extent": {
            "xmin": extent[0],
            "ymin": extent[1],
            "xmax": extent[2],
            "ymax": extent[3],
            "spatialReference": {"wkid": 4326, "latestWkid": 4326}
        }
    })
}

pub fn point_feature(id: i64, x: f64, y: f64) -> Value {
    json!({
        "attributes": {"OBJECTID": id, "NUMBER": format!("{}", id)},
        "geometry": {"x": x, "y": y}
    })
}

pub fn features(geometry_type: &str, features: Vec<Value>) -> Value {
    json!({
        "geometryType": geometry_type,
        "spatialReference": {"wkid": 4326},
        "features": features
    })
}

pub async fn mount_metadata(server: &MockServer, metadata: Value) {
    Mock::given(method("GET"))
        .and(path(LAYER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata))
        .mount(server)
        .await;
}

/// Parse a CSV artifact into its header and rows
pub fn read_csv(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("Failed to open CSV");
    let header = reader
        .headers()
        .expect("Failed to read header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("Bad CSV row").iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
