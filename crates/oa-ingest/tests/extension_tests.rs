//! Extension resolution against a live HTTP server
//!
//! Covers the cascade from path extension through Content-Type and
//! Content-Disposition down to content sniffing.

mod common;

use common::test_context;
use oa_ingest::extension::resolve;
use oa_ingest::IngestError;
use url::Url;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const ZIP_HEADER: &[u8] = b"PK\x03\x04\x14\x00\x00\x00\x08\x00";

#[tokio::test]
async fn test_path_extension_needs_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/data/file.csv", server.uri())).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".csv"));
}

#[tokio::test]
async fn test_query_string_uses_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export.csv"))
        .and(query_param("id", "7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("number,street\n1,Main St\n", "text/csv; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/export.csv?id=7", server.uri())).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".csv"));
}

#[tokio::test]
async fn test_script_path_uses_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ZIP_HEADER, "application/x-zip-compressed"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/download.php", server.uri())).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".zip"));
}

#[tokio::test]
async fn test_agreeing_disposition_keeps_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"addresses.csv\"")
                .set_body_raw("{\"not\": \"csv\"}", "text/csv"),
        )
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/get?layer=1", server.uri())).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".csv"));
}

#[tokio::test]
async fn test_conflicting_disposition_falls_through_to_sniffing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=data.json")
                .set_body_raw(ZIP_HEADER, "text/csv"),
        )
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/get?layer=1", server.uri())).unwrap();

    // Neither the Content-Type nor the attachment name is trusted
    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".zip"));
}

#[tokio::test]
async fn test_sniffs_when_content_type_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"type\": \"FeatureCollection\"}", "application/x-vendor-export"),
        )
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/api?format=geo", server.uri())).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".json"));
}

#[tokio::test]
async fn test_empty_body_has_no_extension() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(Vec::<u8>::new(), "application/x-vendor-export"))
        .mount(&server)
        .await;

    let ctx = test_context();
    let url = Url::parse(&format!("{}/export.aspx", server.uri())).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap(), None);
}

#[tokio::test]
async fn test_local_file_is_sniffed() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("download.php");
    std::fs::write(&file, ZIP_HEADER).unwrap();

    let ctx = test_context();
    let url = Url::from_file_path(&file).unwrap();

    assert_eq!(resolve(&ctx, &url).await.unwrap().as_deref(), Some(".zip"));
}

#[tokio::test]
async fn test_unsupported_scheme_is_resolution_error() {
    let ctx = test_context();
    let url = Url::parse("ftp://ftp.example.com/pub/export.php").unwrap();

    let err = resolve(&ctx, &url).await.unwrap_err();
    assert!(matches!(err, IngestError::Resolution { .. }), "{:?}", err);
}
