//! API route definitions.

use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::{blocking, ApiError};
use super::state::AppState;
use crate::detect::{Explanation, ModelDetection};
use crate::storage::EventQuery;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/logs", get(list_logs))
        .route("/alerts", get(list_alerts))
        .route("/detect", get(rate_detect))
        .route("/ml-detect", get(model_detect))
        .route("/explain", get(explain_detect))
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
struct LogsParams {
    ip: Option<String>,
}

async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Result<Json<Value>, ApiError> {
    let query = EventQuery {
        identity: params.ip,
        ..EventQuery::default()
    };
    let events = blocking(move || state.engine.list_events(&query)).await?;
    Ok(Json(json!({ "data": events, "meta": { "total": events.len() } })))
}

async fn list_alerts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let alerts = blocking(move || state.engine.list_alerts()).await?;
    Ok(Json(json!({ "data": alerts, "meta": { "total": alerts.len() } })))
}

async fn rate_detect(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let flagged = blocking(move || state.engine.rate_detect()).await?;
    Ok(Json(json!({
        "data": { "suspicious_ips": flagged },
        "meta": { "flagged": flagged.len() }
    })))
}

async fn model_detect(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let detection = blocking(move || state.engine.model_detect()).await?;
    let body = match detection {
        ModelDetection::NoLogs => json!({
            "data": [],
            "meta": { "status": "no_logs", "message": "No logs available" }
        }),
        ModelDetection::Windows(verdicts) => {
            let flagged = verdicts.iter().filter(|v| v.is_anomaly).count();
            json!({
                "data": verdicts,
                "meta": { "status": "ok", "total": verdicts.len(), "flagged": flagged }
            })
        }
    };
    Ok(Json(body))
}

async fn explain_detect(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let explanation = blocking(move || state.engine.explain_detect()).await?;
    let body = match explanation {
        Explanation::NoTraffic => json!({
            "data": [],
            "meta": { "status": "no_traffic", "message": "No traffic data" }
        }),
        Explanation::NoAttacks => json!({
            "data": [],
            "meta": { "status": "no_attacks", "message": "No attacks detected" }
        }),
        Explanation::Attacks(windows) => json!({
            "data": windows,
            "meta": { "status": "attacks", "total": windows.len() }
        }),
    };
    Ok(Json(body))
}
