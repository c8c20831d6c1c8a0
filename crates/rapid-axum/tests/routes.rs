//! Route tests driven through the router with in-memory engine fakes.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rapid_axum::bootstrap::{AxumContext, CorsConfig};
use rapid_axum::routes::create_router;
use rapid_axum::sse::SseBroadcaster;
use rapid_core::EngineConfig;
use rapid_download::testing::{MemoryEntryRepository, MemoryStorage, ScriptedTransport};
use rapid_download::{DownloadEngine, EngineDeps, ProviderResolver};

fn app_with(config: EngineConfig) -> Router {
    let sse = Arc::new(SseBroadcaster::with_defaults());
    let engine = DownloadEngine::new(EngineDeps {
        transport: Arc::new(ScriptedTransport::new(vec![1u8; 2000])),
        storage: Arc::new(MemoryStorage::new()),
        repository: Arc::new(MemoryEntryRepository::new()),
        emitter: sse.clone(),
        resolver: ProviderResolver::with_builtin(&config),
        config,
    })
    .unwrap();
    create_router(AxumContext::new(Arc::new(engine), sse), &CorsConfig::AllowAll)
}

fn app() -> Router {
    app_with(
        EngineConfig::new("/unused")
            .with_chunk_count(2)
            .with_auto_start(false)
            .with_progress_interval(Duration::ZERO),
    )
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/entries",
        Some(json!({ "url": format!("https://example.com/files/{name}") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_create_returns_queued_download_shape() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/entries",
        Some(json!({ "url": "https://example.com/files/data.bin", "client": "browser" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "data.bin");
    assert_eq!(body["status"], "queued");
    assert_eq!(body["chunklen"], 2);
    assert_eq!(body["size"], 2000);
    assert_eq!(body["type"], "application/octet-stream");
    assert_eq!(body["resumable"], true);
    assert_eq!(body["acceptsRanges"], true);
    assert_eq!(body["downloadedChunks"], json!([]));
}

#[tokio::test]
async fn test_list_is_ordered_and_paged() {
    let app = app_with(
        EngineConfig::new("/unused")
            .with_auto_start(false)
            .with_page_size(2),
    );
    let a = create(&app, "a.bin").await;
    let b = create(&app, "b.bin").await;
    let c = create(&app, "c.bin").await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/entries?page=1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-next-page"], "2");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = std::str::from_utf8(&bytes).unwrap();
    let pos_a = text.find(&a).unwrap();
    let pos_b = text.find(&b).unwrap();
    assert!(pos_a < pos_b);
    assert!(!text.contains(&c));

    let (status, body) = send(&app, Method::GET, "/entries?page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let page = body.as_object().unwrap();
    assert_eq!(page.len(), 1);
    assert!(page.contains_key(&c));
}

#[tokio::test]
async fn test_unknown_id_is_not_found_with_json_body() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/entries/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_single_update_applies_intent_and_ignores_engine_fields() {
    let app = app();
    let id = create(&app, "a.bin").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/entries/{id}"),
        Some(json!({ "status": "paused", "progress": 80.0, "name": "renamed.bin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    assert_eq!(body["name"], "renamed.bin");
    assert_eq!(body["progress"], 0.0);
}

#[tokio::test]
async fn test_single_update_with_unknown_status_is_bad_request() {
    let app = app();
    let id = create(&app, "a.bin").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/entries/{id}"),
        Some(json!({ "status": "exploded" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_with_invalid_id_is_multi_status() {
    let app = app();
    let a = create(&app, "a.bin").await;
    let b = create(&app, "b.bin").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/entries",
        Some(json!({
            "ids": [a, "missing", b],
            "payload": [{ "status": "paused" }, { "status": "paused" }, { "status": "paused" }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["ok"], false);
    assert_eq!(results[1]["id"], "missing");
    assert_eq!(results[2]["ok"], true);

    let (_, a_body) = send(&app, Method::GET, &format!("/entries/{a}"), None).await;
    assert_eq!(a_body["status"], "paused");
}

#[tokio::test]
async fn test_batch_all_applied_is_ok() {
    let app = app();
    let a = create(&app, "a.bin").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/entries",
        Some(json!({ "ids": [a], "payload": [{ "name": "x.bin" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["ok"], true);
}

#[tokio::test]
async fn test_delete_removes_entry() {
    let app = app();
    let id = create(&app, "a.bin").await;

    let (status, _) = send(&app, Method::DELETE, &format!("/entries/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/entries/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_provider_is_bad_request() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/entries",
        Some(json!({ "url": "https://example.com/a.bin", "provider": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_resolve_replaces_request() {
    let app = app();
    let id = create(&app, "a.bin").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/entries/{id}/resolve"),
        Some(json!({ "url": "https://mirror.example.com/files/a.bin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://mirror.example.com/files/a.bin");
    assert_eq!(body["expired"], false);
}

#[tokio::test]
async fn test_events_endpoint_streams_sse() {
    let response = app()
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
}
