//! Integration tests for the REST calls around an upload.

mod helpers;

use anyhow::Result;
use uuid::Uuid;

use rust_uploader::cloud::api::ApiClient;
use rust_uploader::cloud::error::UploadError;
use rust_uploader::config::{ProducerPolicy, UploaderConfig};

use helpers::{test_client, MockResponse, MockServer};

const ENTITY: &str = "1b4e28ba-2fa1-41d2-883f-0016d3cca427";

fn api(server: &MockServer) -> ApiClient {
    let config = UploaderConfig::new(&server.url(), "test-token", None, ProducerPolicy::FailFast).unwrap();
    ApiClient::with_client(test_client(), &config)
}

#[tokio::test]
async fn test_request_upload_url() -> Result<()> {
    let server = MockServer::start().await;
    server.respond(MockResponse::ok(
        r#"{"data": {"type": "uplugin_content", "url": "https://storage.example.com/bucket/key?sig=1", "mime": "application/zip", "size": 1234}}"#,
    ));

    let entity = Uuid::parse_str(ENTITY)?;
    let record = api(&server)
        .request_upload_url(entity, "uplugin_content", "application/zip", 1234, "Widget.zip")
        .await?;

    assert_eq!(record.url, "https://storage.example.com/bucket/key?sig=1");
    assert_eq!(record.size, Some(1234));

    let request = &server.requests()[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path(), "/files/upload");
    for pair in [
        format!("entityId={}", ENTITY),
        "type=uplugin_content".to_string(),
        "mime=application%2Fzip".to_string(),
        "size=1234".to_string(),
        "original-path=Widget.zip".to_string(),
    ] {
        assert!(request.query().contains(&pair), "missing {} in {}", pair, request.query());
    }
    assert_eq!(request.header("authorization"), Some("Bearer test-token"));
    Ok(())
}

#[tokio::test]
async fn test_request_upload_url_without_url() -> Result<()> {
    let server = MockServer::start().await;
    server.respond(MockResponse::ok(r#"{"data": {"type": "uplugin_content"}}"#));

    let err = api(&server)
        .request_upload_url(Uuid::parse_str(ENTITY)?, "uplugin_content", "application/zip", 1, "Widget.zip")
        .await
        .unwrap_err();
    assert!(err.is_construction());
    Ok(())
}

#[tokio::test]
async fn test_request_upload_url_server_error() -> Result<()> {
    let server = MockServer::start().await;
    server.respond(MockResponse::new(403, r#"{"error":"forbidden entity"}"#));

    let err = api(&server)
        .request_upload_url(Uuid::parse_str(ENTITY)?, "uplugin_content", "application/zip", 1, "Widget.zip")
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Server { status: 403, .. }));
    assert!(err.to_string().contains("forbidden entity"));
    Ok(())
}

#[tokio::test]
async fn test_create_package_job() -> Result<()> {
    let server = MockServer::start().await;
    server.respond(MockResponse::ok("{}"));

    api(&server).create_package_job(Uuid::parse_str(ENTITY)?).await?;

    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path(), "/jobs/package");
    assert_eq!(request.header("content-type"), Some("application/json"));

    let body: serde_json::Value = serde_json::from_slice(&request.body)?;
    assert_eq!(body, serde_json::json!({ "entityId": ENTITY }));
    Ok(())
}
