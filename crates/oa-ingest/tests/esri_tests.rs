//! ESRI feature layer harvesting against a mock ArcGIS REST server

mod common;

use common::{
    features, layer_metadata, layer_url, mount_metadata, point_feature, query_path, read_csv, test_context,
};
use oa_ingest::esri::{download_layer, fetch_metadata, geometry, EsriDownloadTask, ESRI_DIR};
use oa_ingest::{DownloadTask, IngestError};
use serde_json::json;
use url::Url;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const FULL_EXTENT: [f64; 4] = [-10.0, -10.0, 10.0, 10.0];

/// 500 points whose mean is exactly the origin
fn full_page() -> Vec<serde_json::Value> {
    (0..500)
        .map(|i| {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = if i % 4 < 2 { 2.0 } else { -2.0 };
            point_feature(i, x, y)
        })
        .collect()
}

async fn mount_tile(server: &MockServer, envelope: &str, body: serde_json::Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path(query_path()))
        .and(query_param("geometry", envelope))
        .and(query_param("geometryType", "esriGeometryEnvelope"))
        .and(query_param("inSR", "4326"))
        .and(query_param("outSR", "4326"))
        .and(query_param("geometryPrecision", "7"))
        .and(query_param("returnGeometry", "true"))
        .and(query_param("outFields", "*"))
        .and(query_param("f", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_page_splits_into_four_quadrants_at_mean() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;

    mount_tile(&server, "-10,-10,10,10", features(geometry::POINT, full_page()), 1).await;

    // Each quadrant repeats one feature from the parent page and adds one new one
    let quadrants = [
        ("-10,-10,0,0", 3, 1000),
        ("0,-10,10,0", 0, 1001),
        ("-10,0,0,10", 1, 1002),
        ("0,0,10,10", 2, 1003),
    ];
    for (envelope, repeated, new_id) in quadrants {
        let body = features(
            geometry::POINT,
            vec![point_feature(repeated, 0.5, 0.5), point_feature(new_id, 0.25, 0.75)],
        );
        mount_tile(&server, envelope, body, 1).await;
    }

    let ctx = test_context();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("layer.csv");
    let url = Url::parse(&layer_url(&server)).unwrap();

    let written = download_layer(&ctx, &url, &output).await.unwrap();
    assert_eq!(written, 504);

    let (header, rows) = read_csv(&output);
    assert_eq!(header, vec!["OBJECTID", "NUMBER", "X", "Y", "OA:geom"]);
    assert_eq!(rows.len(), 504);

    let mut ids: Vec<i64> = rows.iter().map(|r| r[0].parse().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 504);

    // Parent rows come first, then quadrants in order
    assert_eq!(&rows[0][..4], &["0", "0", "1", "2"]);
    assert!(rows[0][4].starts_with("POINT"), "{}", rows[0][4]);
    assert_eq!(rows[500][0], "1000");
    assert_eq!(rows[503][0], "1003");
}

#[tokio::test]
async fn test_partial_page_does_not_subdivide() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;

    let page: Vec<_> = (0..499).map(|i| point_feature(i, 0.0, 0.0)).collect();
    mount_tile(&server, "-10,-10,10,10", features(geometry::POINT, page), 1).await;

    let ctx = test_context();
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&layer_url(&server)).unwrap();

    let written = download_layer(&ctx, &url, &dir.path().join("layer.csv")).await.unwrap();
    assert_eq!(written, 499);
}

#[tokio::test]
async fn test_query_succeeds_on_third_attempt() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;

    Mock::given(method("GET"))
        .and(path(query_path()))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(query_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(features(
                geometry::POINT,
                vec![point_feature(1, -122.25, 37.5), point_feature(2, -122.5, 37.75)],
            )),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context();
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&layer_url(&server)).unwrap();

    let written = download_layer(&ctx, &url, &dir.path().join("layer.csv")).await.unwrap();
    assert_eq!(written, 2);
}

#[tokio::test]
async fn test_query_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;

    Mock::given(method("GET"))
        .and(path(query_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": {"code": 400, "message": "Invalid query"}})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let ctx = test_context();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("layer.csv");
    let url = Url::parse(&layer_url(&server)).unwrap();

    let err = download_layer(&ctx, &url, &output).await.unwrap_err();
    match err {
        IngestError::Download { message, .. } => assert!(message.contains("Invalid query"), "{}", message),
        other => panic!("expected download error, got {:?}", other),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_degenerate_ring_keeps_row_at_bbox_midpoint() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POLYGON, 500, FULL_EXTENT)).await;

    let body = features(
        geometry::POLYGON,
        vec![
            json!({
                "attributes": {"OBJECTID": 7, "NUMBER": "12"},
                "geometry": {"rings": [[[0, 0], [2, 4], [0, 0]]]}
            }),
            json!({
                "attributes": {"OBJECTID": 8, "NUMBER": "14"},
                "geometry": {"rings": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]]}
            }),
        ],
    );
    mount_tile(&server, "-10,-10,10,10", body, 1).await;

    let ctx = test_context();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("layer.csv");
    let url = Url::parse(&layer_url(&server)).unwrap();

    assert_eq!(download_layer(&ctx, &url, &output).await.unwrap(), 2);

    let (_, rows) = read_csv(&output);
    assert_eq!(&rows[0][..4], &["7", "12", "1", "2"]);
    assert_eq!(&rows[1][..4], &["8", "14", "2", "2"]);
    assert!(rows[1][4].starts_with("POLYGON"), "{}", rows[1][4]);
}

#[tokio::test]
async fn test_unsupported_geometry_rows_are_dropped() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;

    let body = json!({
        "features": [
            {"attributes": {"OBJECTID": 1, "NUMBER": "1"}, "geometry": {"x": 1.0, "y": 1.0}},
            {"attributes": {"OBJECTID": 2, "NUMBER": "2"}},
            {"attributes": {"NUMBER": "3"}, "geometry": {"x": 3.0, "y": 3.0}}
        ]
    });
    mount_tile(&server, "-10,-10,10,10", body, 1).await;

    let ctx = test_context();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("layer.csv");
    let url = Url::parse(&layer_url(&server)).unwrap();

    assert_eq!(download_layer(&ctx, &url, &output).await.unwrap(), 1);
    let (_, rows) = read_csv(&output);
    assert_eq!(rows[0][0], "1");
}

#[tokio::test]
async fn test_web_mercator_extent_is_reprojected() {
    let server = MockServer::start().await;
    let mut metadata = layer_metadata(geometry::POINT, 500, [0.0, 0.0, 0.0, 0.0]);
    metadata["extent"] = json!({
        "xmin": 0.0,
        "ymin": 0.0,
        "xmax": 20037508.342789244,
        "ymax": 0.0,
        "spatialReference": {"wkid": 102100, "latestWkid": 3857}
    });
    mount_metadata(&server, metadata).await;

    let ctx = test_context();
    let url = Url::parse(&layer_url(&server)).unwrap();
    let layer = fetch_metadata(&ctx, &url).await.unwrap();

    assert!((layer.extent.xmax - 180.0).abs() < 1e-6, "{}", layer.extent);
    assert!(layer.extent.ymax.abs() < 1e-6, "{}", layer.extent);
}

#[tokio::test]
async fn test_metadata_failures_are_download_errors() {
    let cases = [
        (json!({"error": {"code": 499, "message": "Token Required"}}), "Token Required"),
        (json!({"geometryType": "esriGeometryPoint", "fields": []}), "no fields available"),
        (
            json!({"geometryType": "esriGeometryPoint", "fields": [{"name": "A", "type": "esriFieldTypeString"}]}),
            "object id",
        ),
        (
            json!({"fields": [{"name": "OBJECTID", "type": "esriFieldTypeOID"}], "extent": {"xmin": 0, "ymin": 0, "xmax": 1, "ymax": 1}}),
            "geometry type",
        ),
        (
            json!({"geometryType": "esriGeometryPoint", "fields": [{"name": "OBJECTID", "type": "esriFieldTypeOID"}]}),
            "extent",
        ),
    ];

    for (body, expected) in cases {
        let server = MockServer::start().await;
        mount_metadata(&server, body).await;

        let ctx = test_context();
        let url = Url::parse(&layer_url(&server)).unwrap();

        match fetch_metadata(&ctx, &url).await {
            Err(IngestError::Download { message, .. }) => {
                assert!(message.contains(expected), "{} does not mention {}", message, expected)
            },
            other => panic!("expected download error for {}, got {:?}", expected, other),
        }
    }
}

#[tokio::test]
async fn test_metadata_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::LAYER_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&layer_url(&server)).unwrap();

    let err = fetch_metadata(&ctx, &url).await.unwrap_err();
    assert!(matches!(err, IngestError::Download { status: Some(503), .. }), "{:?}", err);
}

#[tokio::test]
async fn test_task_writes_one_csv_per_layer() {
    let server = MockServer::start().await;
    mount_metadata(&server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;
    mount_tile(
        &server,
        "-10,-10,10,10",
        features(geometry::POINT, vec![point_feature(1, 1.0, 1.0)]),
        1,
    )
    .await;

    let ctx = test_context();
    let workdir = tempfile::tempdir().unwrap();
    let task = DownloadTask::from_type_string("esri", Some("us-xx-layer".into())).unwrap();
    let raw = layer_url(&server);

    let first = task.download(&ctx, &[raw.clone()], workdir.path()).await.unwrap();
    // A second run reuses the CSV without touching the server
    let second = task.download(&ctx, &[raw.clone()], workdir.path()).await.unwrap();

    assert_eq!(first, second);
    let expected = EsriDownloadTask::new(Some("us-xx-layer".into())).file_name(&Url::parse(&raw).unwrap());
    assert_eq!(first[0], workdir.path().join(ESRI_DIR).join(expected));
}

#[tokio::test]
async fn test_layers_on_different_ports_keep_their_own_rows() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for (server, id, x) in [(&first, 1, 1.0), (&second, 2, 2.0)] {
        mount_metadata(server, layer_metadata(geometry::POINT, 500, FULL_EXTENT)).await;
        mount_tile(
            server,
            "-10,-10,10,10",
            features(geometry::POINT, vec![point_feature(id, x, x)]),
            1,
        )
        .await;
    }

    let ctx = test_context();
    let workdir = tempfile::tempdir().unwrap();
    let task = DownloadTask::from_type_string("esri", None).unwrap();

    let files = task
        .download(&ctx, &[layer_url(&first), layer_url(&second)], workdir.path())
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_ne!(files[0], files[1]);

    let (_, rows) = read_csv(&files[0]);
    assert_eq!(rows[0][0], "1");
    let (_, rows) = read_csv(&files[1]);
    assert_eq!(rows[0][0], "2");
}
