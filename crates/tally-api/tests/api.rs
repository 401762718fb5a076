//! HTTP surface tests over in-memory stores.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use tally_api::setup::routes::build_router;
use tally_api::AppState;
use tally_core::models::{CleanupResponse, DeleteResponse, IngestResponse, ListResponse};
use tally_core::{constants, Config};
use tally_db::AssetCatalog;
use tally_processing::UploadValidator;
use tally_services::test_helpers::MemoryCatalog;
use tally_services::{
    HealthReporter, HealthReporterConfig, IngestionService, MemoryGate, OpCounters,
    ReconciliationEngine, StaticTokenAuthorizer,
};
use tally_storage::{MemoryStore, ObjectStore};
use tower::ServiceExt;

const TOKEN: &str = "test-token";
const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4];

fn test_config() -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://unused".to_string(),
        api_token: TOKEN.to_string(),
        local_storage_path: "/tmp/unused".to_string(),
        max_file_size_bytes: constants::DEFAULT_MAX_FILE_SIZE_BYTES,
        compression_threshold_bytes: constants::DEFAULT_COMPRESSION_THRESHOLD_BYTES,
        encode_quality: constants::DEFAULT_ENCODE_QUALITY,
        encode_max_dimension: constants::DEFAULT_MAX_DIMENSION,
        grace_window_secs: constants::DEFAULT_GRACE_WINDOW_SECS,
        max_scan_items: constants::DEFAULT_MAX_SCAN_ITEMS,
        safe_mode: false,
        max_memory_usage_percent: 100.0,
        environment: "test".to_string(),
    }
}

fn test_router() -> (Router, Arc<MemoryStore>, Arc<MemoryCatalog>) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(MemoryCatalog::new());
    let authorizer = Arc::new(StaticTokenAuthorizer::new(TOKEN));
    let counters = Arc::new(OpCounters::new());

    let ingestion = Arc::new(IngestionService::new(
        store.clone(),
        catalog.clone(),
        authorizer.clone(),
        UploadValidator::with_defaults(config.max_file_size_bytes),
        None,
        counters.clone(),
    ));
    let reconciliation = Arc::new(ReconciliationEngine::new(
        store.clone(),
        catalog.clone(),
        config.grace_window_secs,
        config.max_scan_items,
    ));
    let health = Arc::new(HealthReporter::new(
        store.clone(),
        catalog.clone(),
        MemoryGate::new(config.max_memory_usage_percent),
        counters,
        HealthReporterConfig {
            safe_mode: false,
            max_memory_usage_percent: config.max_memory_usage_percent,
        },
    ));

    let state = Arc::new(AppState {
        config,
        authorizer,
        ingestion,
        reconciliation,
        health,
    });
    (build_router(state), store, catalog)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn ingest_body(file_name: &str) -> Value {
    json!({
        "fileName": file_name,
        "fileContent": base64::engine::general_purpose::STANDARD.encode(JPEG_BYTES),
        "fileType": "image/jpeg",
    })
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_ingest_list_delete_round_trip() {
    let (router, store, catalog) = test_router();

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/assets",
            Some(TOKEN),
            Some(ingest_body("photo.jpg")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: IngestResponse = body_json(response).await;
    assert!(body.success);
    assert!(body.storage_key.starts_with("assets/"));
    assert!(store.exists(&body.storage_key).await.unwrap());
    assert_eq!(catalog.count().await.unwrap(), 1);

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/assets?prefix=assets/",
            Some(TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list: ListResponse = body_json(response).await;
    assert_eq!(list.images.len(), 1);
    assert_eq!(list.images[0].name, body.storage_key);

    for _ in 0..2 {
        // Idempotent: the second delete of the same key also succeeds.
        let response = router
            .clone()
            .oneshot(request(
                "DELETE",
                "/api/v1/assets",
                Some(TOKEN),
                Some(json!({ "filePath": body.storage_key })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let deleted: DeleteResponse = body_json(response).await;
        assert!(deleted.success);
    }
    assert!(store.is_empty());
    assert_eq!(catalog.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_or_wrong_token_is_401() {
    let (router, store, _) = test_router();

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/assets",
            None,
            Some(ingest_body("photo.jpg")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/assets",
            Some("wrong-token"),
            Some(ingest_body("photo.jpg")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_invalid_base64_is_400_with_error_code() {
    let (router, _, _) = test_router();

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/assets",
            Some(TOKEN),
            Some(json!({
                "fileName": "photo.jpg",
                "fileContent": "!!! not base64 !!!",
                "fileType": "image/jpeg",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(response).await;
    assert_eq!(body["code"], "PAYLOAD_INVALID");
    assert_eq!(body["recoverable"], false);
}

#[tokio::test]
async fn test_destructive_cleanup_requires_force() {
    let (router, _, _) = test_router();

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/reconcile/cleanup",
            Some(TOKEN),
            Some(json!({ "dryRun": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // With force it is accepted.
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/reconcile/cleanup",
            Some(TOKEN),
            Some(json!({ "dryRun": false, "force": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: CleanupResponse = body_json(response).await;
    assert!(!body.summary.dry_run);
}

#[tokio::test]
async fn test_cleanup_defaults_to_dry_run() {
    let (router, _, _) = test_router();

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/reconcile/cleanup",
            Some(TOKEN),
            Some(json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: CleanupResponse = body_json(response).await;
    assert!(body.summary.dry_run);
}

#[tokio::test]
async fn test_scan_endpoints_return_reports() {
    let (router, _, _) = test_router();

    for uri in ["/api/v1/reconcile/objects", "/api/v1/reconcile/records"] {
        let response = router
            .clone()
            .oneshot(request("POST", uri, Some(TOKEN), Some(json!({}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response).await;
        assert_eq!(body["total"], 0);
    }
}

#[tokio::test]
async fn test_health_endpoints() {
    let (router, store, _) = test_router();

    let response = router
        .clone()
        .oneshot(request("GET", "/health/live", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/health",
            Some(TOKEN),
            Some(json!({ "testUpload": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = body_json(response).await;
    assert_eq!(body["summary"]["score"], 100);
    assert_eq!(body["summary"]["status"], "healthy");
    // The round-trip probe cleans up after itself.
    assert!(store.is_empty());
}
