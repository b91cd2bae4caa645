//! Router tests: every request is logged by the middleware, and the
//! detection endpoints are thin call-throughs to the engine.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use sentinelai::api::{self, state::AppState};
use sentinelai::detect::DetectionEngine;
use sentinelai::model::{ArtifactFile, Preloaded};
use sentinelai::detect::{Alert, TrafficEvent};
use sentinelai::storage::{EventQuery, MemoryStore, StoreError, TrafficStore};
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

/// Every operation fails as if the database were gone.
struct UnreachableStore;

impl TrafficStore for UnreachableStore {
    fn insert_event(&self, _event: &TrafficEvent) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn query_events(&self, _query: &EventQuery) -> Result<Vec<TrafficEvent>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn insert_alert(&self, _alert: &Alert) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn list_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        Err(StoreError::Poisoned)
    }
}

fn state_with(store: Arc<MemoryStore>, scorer_threshold: Option<u64>) -> AppState {
    let engine = match scorer_threshold {
        Some(limit) => DetectionEngine::new(store, Arc::new(Preloaded::new(move |count: u64| count > limit))),
        None => DetectionEngine::new(store, Arc::new(ArtifactFile::new("/nonexistent/model.json"))),
    };
    AppState::new(engine)
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    get_with(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn get_with(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = api::router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1_000_000)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = get(state_with(Arc::new(MemoryStore::new()), Some(10)), "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "healthy");
    assert!(json["data"]["version"].is_string());
}

#[tokio::test]
async fn test_health_at_root() {
    let (status, json) = get(state_with(Arc::new(MemoryStore::new()), Some(10)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_root_banner() {
    let (status, json) = get(state_with(Arc::new(MemoryStore::new()), Some(10)), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["message"], "SentinelAI API Gateway Running");
}

#[tokio::test]
async fn test_every_request_is_logged() {
    let store = Arc::new(MemoryStore::new());
    let state = state_with(store.clone(), Some(10));

    get(state.clone(), "/api/v1/health").await;
    let (status, json) = get(state, "/api/v1/logs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["total"], 2);
    assert_eq!(json["data"][0]["path"], "/api/v1/health");
    assert_eq!(json["data"][0]["ip"], "unknown");
    assert_eq!(store.list_events().unwrap().len(), 2);
}

#[tokio::test]
async fn test_forwarded_for_identity_and_ip_filter() {
    let store = Arc::new(MemoryStore::new());
    let mut state = state_with(store.clone(), Some(10));
    state.trust_forwarded_for = true;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::empty())
        .unwrap();
    get_with(state.clone(), request).await;

    let (_, json) = get(state, "/api/v1/logs?ip=198.51.100.4").await;
    assert_eq!(json["meta"]["total"], 1);
    assert_eq!(json["data"][0]["ip"], "198.51.100.4");
}

#[tokio::test]
async fn test_detect_flags_burst_and_records_alert() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for _ in 0..11 {
        store
            .insert_event(&TrafficEvent::new("10.0.0.5", "/login", now))
            .unwrap();
    }
    let state = state_with(store, Some(10));

    let (status, json) = get(state.clone(), "/api/v1/detect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["suspicious_ips"], serde_json::json!(["10.0.0.5"]));

    let (_, json) = get(state, "/api/v1/alerts").await;
    assert_eq!(json["meta"]["total"], 1);
    assert_eq!(json["data"][0]["reason"], "High request rate");
}

#[tokio::test]
async fn test_ml_detect_and_explain() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for _ in 0..15 {
        store
            .insert_event(&TrafficEvent::new("10.0.0.5", "/", now))
            .unwrap();
    }
    let state = state_with(store, Some(10));

    let (status, json) = get(state.clone(), "/api/v1/ml-detect").await;
    assert_eq!(status, StatusCode::OK);
    let flagged: Vec<&Value> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|v| v["is_anomaly"] == true)
        .collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0]["ip"], "10.0.0.5");

    let (_, json) = get(state, "/api/v1/explain").await;
    assert_eq!(json["meta"]["status"], "attacks");
    assert!(json["data"][0]["explanation"]
        .as_str()
        .unwrap()
        .starts_with("IP 10.0.0.5 generated"));
}

#[tokio::test]
async fn test_explain_without_attacks() {
    let (status, json) = get(state_with(Arc::new(MemoryStore::new()), Some(10)), "/api/v1/explain").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["status"], "no_attacks");
    assert_eq!(json["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_missing_model_is_service_unavailable() {
    let (status, json) = get(state_with(Arc::new(MemoryStore::new()), None), "/api/v1/ml-detect").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["kind"], "model_unavailable");
}

#[tokio::test]
async fn test_unreachable_store_is_service_unavailable() {
    let engine = DetectionEngine::new(
        Arc::new(UnreachableStore),
        Arc::new(Preloaded::new(|count: u64| count > 10)),
    );
    let state = AppState::new(engine);

    // request logging fails too, but the request is still served
    for uri in ["/api/v1/detect", "/api/v1/logs", "/api/v1/alerts", "/api/v1/ml-detect"] {
        let (status, json) = get(state.clone(), uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        assert_eq!(json["error"]["kind"], "store_unavailable", "{}", uri);
    }

    let (status, _) = get(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = api::router(state_with(Arc::new(MemoryStore::new()), Some(10)))
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
