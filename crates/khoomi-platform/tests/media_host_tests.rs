//! HttpMediaHost Tests
//!
//! Tests for:
//! - Signed uploads of file bytes and remote URLs
//! - Upload failures surfacing as media errors
//! - Destroy outcomes, including already-deleted assets

use std::time::Duration;

use bytes::Bytes;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use khoomi_platform::media::{HttpMediaHost, HttpMediaHostConfig, MediaHost, MediaSource};
use khoomi_platform::PlatformError;

fn host_for(server: &MockServer) -> HttpMediaHost {
    HttpMediaHost::new(HttpMediaHostConfig {
        upload_url: format!("{}/image/upload", server.uri()),
        destroy_url: format!("{}/image/destroy", server.uri()),
        api_key: "key-123".to_string(),
        api_secret: "secret".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn png() -> MediaSource {
    MediaSource::image("logo.png", "image/png", Bytes::from_static(b"\x89PNG fake")).unwrap()
}

#[tokio::test]
async fn test_upload_returns_url_and_handle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image/upload"))
        .and(body_string_contains("key-123"))
        .and(body_string_contains("khoomi/shops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secure_url": "https://cdn.example.com/khoomi/shops/abc.png",
            "public_id": "khoomi/shops/abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let asset = host_for(&server).upload(png(), "khoomi/shops").await.unwrap();

    assert_eq!(asset.url, "https://cdn.example.com/khoomi/shops/abc.png");
    assert_eq!(asset.handle, "khoomi/shops/abc");
}

#[tokio::test]
async fn test_remote_url_is_forwarded_to_host() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image/upload"))
        .and(body_string_contains("https://images.example.org/mug.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secure_url": "https://cdn.example.com/khoomi/users/mug.jpg",
            "public_id": "khoomi/users/mug"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = MediaSource::remote("https://images.example.org/mug.jpg").unwrap();
    let asset = host_for(&server).upload(source, "khoomi/users").await.unwrap();

    assert_eq!(asset.handle, "khoomi/users/mug");
}

#[tokio::test]
async fn test_upload_rejected_by_host() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad signature"))
        .mount(&server)
        .await;

    let err = host_for(&server).upload(png(), "khoomi/shops").await.unwrap_err();

    match err {
        PlatformError::Media { message } => {
            assert!(message.contains("401"));
            assert!(message.contains("bad signature"));
        }
        other => panic!("expected media error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_destroy_accepts_missing_asset() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image/destroy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "not found" })))
        .expect(1)
        .mount(&server)
        .await;

    host_for(&server).destroy("khoomi/shops/gone").await.unwrap();
}

#[tokio::test]
async fn test_destroy_unexpected_result_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image/destroy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "error" })))
        .mount(&server)
        .await;

    let err = host_for(&server).destroy("khoomi/shops/abc").await.unwrap_err();
    assert!(matches!(err, PlatformError::Media { .. }));
}

#[tokio::test]
async fn test_rollback_destroys_uploads_when_write_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image/destroy"))
        .and(body_string_contains("khoomi/listings/one"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/image/destroy"))
        .and(body_string_contains("khoomi/listings/two"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let host = host_for(&server);
    let handles = vec!["khoomi/listings/one".to_string(), "khoomi/listings/two".to_string()];
    let result: khoomi_platform::Result<()> = khoomi_platform::media::with_rollback(&host, &handles, async {
        Err(PlatformError::internal("insert failed"))
    })
    .await;

    assert!(result.is_err());
}
