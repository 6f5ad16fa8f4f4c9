//! Route tests for the competition and health endpoints.
//!
//! The router runs against an `InMemoryStore` and a stub upstream, so every
//! cache outcome can be produced without Redis or the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use proptest::prelude::*;
use serde_json::{json, Value};
use tatami_api::{create_router, ApiConfig, AppState, CompetitionSource};
use tatami_core::{encode_timestamp, ProducerError, RefreshConfig};
use tatami_storage::mock::{ReadOnlyStore, UnavailableStore};
use tatami_storage::{InMemoryStore, KeyValueStore};
use tower::ServiceExt;

// ============================================================================
// HELPERS
// ============================================================================

/// Upstream stub: echoes the id back, or fails when told to.
#[derive(Default)]
struct StubSource {
    calls: AtomicUsize,
    fail_with: Option<String>,
}

impl StubSource {
    fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: Some(message.to_string()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompetitionSource for StubSource {
    async fn fetch_competition(&self, id: &str) -> Result<Value, ProducerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(ProducerError::new(message.clone())),
            None => Ok(json!({ "id": id, "categories": [] })),
        }
    }
}

fn app(store: Arc<dyn KeyValueStore>, source: Arc<StubSource>) -> Router {
    let config = RefreshConfig::default().with_staleness(Duration::from_secs(60));
    create_router(AppState::new(store, source, config), &ApiConfig::default())
}

async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("infallible")
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json body")
}

fn cache_status(response: &Response) -> Option<&str> {
    response
        .headers()
        .get("x-cache-status")
        .and_then(|v| v.to_str().ok())
}

// ============================================================================
// COMPETITIONS
// ============================================================================

#[tokio::test]
async fn test_cold_then_fresh() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(StubSource::default());

    let response = get(app(store.clone(), source.clone()), "/competitions/42.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), Some("refreshed"));
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_json(response).await, json!({ "id": "42", "categories": [] }));

    let response = get(app(store.clone(), source.clone()), "/competitions/42.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), Some("fresh"));
    assert_eq!(source.calls(), 1);

    assert!(store.get("competition:42").await.expect("get").is_some());
    assert!(store.get("competition:42:timestamp").await.expect("get").is_some());
}

#[tokio::test]
async fn test_stale_entry_is_served_and_refreshed() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(StubSource::default());
    let old = chrono::Utc::now() - chrono::Duration::minutes(5);
    store
        .set("competition:7", br#"{"id":"7","stale":true}"#)
        .await
        .expect("seed");
    store
        .set("competition:7:timestamp", encode_timestamp(old).as_bytes())
        .await
        .expect("seed");

    let response = get(app(store.clone(), source.clone()), "/competitions/7.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), Some("stale"));
    assert_eq!(body_json(response).await, json!({ "id": "7", "stale": true }));

    // Let the detached refresh land.
    for _ in 0..50 {
        if source.calls() == 1 && store.get("competition:7:lock").await.expect("get").is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stored = store.get("competition:7").await.expect("get").expect("present");
    let stored: Value = serde_json::from_slice(&stored).expect("json");
    assert_eq!(stored, json!({ "id": "7", "categories": [] }));
}

#[tokio::test]
async fn test_cold_refresh_failure_is_bad_gateway() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(StubSource::failing("Upstream returned HTTP 500"));

    let response = get(app(store.clone(), source), "/competitions/1.json").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UPSTREAM_FAILED");
    assert_eq!(body["details"]["kind"], "producer");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("HTTP 500"));

    // No orphaned lock.
    assert_eq!(store.get("competition:1:lock").await.expect("get"), None);
}

#[tokio::test]
async fn test_cold_refresh_write_failure_is_service_unavailable() {
    let store = Arc::new(ReadOnlyStore::new());
    let source = Arc::new(StubSource::default());

    let response = get(app(store.clone(), source.clone()), "/competitions/5.json").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    let body = body_json(response).await;
    assert_eq!(body["code"], "STORE_UNAVAILABLE");
    assert_eq!(body["message"], "Cache store is unavailable");
    assert!(!body.to_string().contains("READONLY"));

    assert_eq!(source.calls(), 1);
    assert_eq!(store.get("competition:5:lock").await.expect("get"), None);
}

#[tokio::test]
async fn test_cold_key_locked_elsewhere_is_retryable() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(StubSource::default());
    store
        .set_if_absent("competition:3:lock", b"other-instance", Duration::from_secs(60))
        .await
        .expect("nx");

    let response = get(app(store, source.clone()), "/competitions/3.json").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok()),
        Some("1")
    );
    assert_eq!(body_json(response).await["code"], "REFRESH_PENDING");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_store_down_is_service_unavailable() {
    let source = Arc::new(StubSource::default());
    let response = get(app(Arc::new(UnavailableStore::new()), source.clone()), "/competitions/1.json").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    assert_eq!(body_json(response).await["code"], "STORE_UNAVAILABLE");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_malformed_paths() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(StubSource::default());

    let response = get(app(store.clone(), source.clone()), "/competitions/42").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app(store.clone(), source.clone()), "/competitions/a:b.json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_INPUT");

    assert_eq!(source.calls(), 0);
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_health_ping_and_live() {
    let app = app(Arc::new(InMemoryStore::new()), Arc::new(StubSource::default()));

    let response = get(app.clone(), "/health/ping").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(app, "/health/live").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_health_ready_reflects_store() {
    let response = get(
        app(Arc::new(InMemoryStore::new()), Arc::new(StubSource::default())),
        "/health/ready",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["details"]["store"]["status"], "healthy");

    let response = get(
        app(Arc::new(UnavailableStore::new()), Arc::new(StubSource::default())),
        "/health/ready",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert!(body["details"]["store"]["error"].is_string());
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

fn test_runtime() -> Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to build runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any well-formed id is served on the first request and cached under
    /// `competition:<id>`.
    #[test]
    fn prop_any_valid_id_is_served_and_cached(id in "[A-Za-z0-9_-]{1,24}") {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let source = Arc::new(StubSource::default());

            let response = get(app(store.clone(), source), &format!("/competitions/{}.json", id)).await;
            prop_assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            prop_assert_eq!(body["id"].as_str(), Some(id.as_str()));

            let cached = store
                .get(&format!("competition:{}", id))
                .await
                .map_err(|e| TestCaseError::fail(format!("store: {}", e)))?;
            prop_assert!(cached.is_some());
            Ok(())
        })?;
    }
}
