//! API layer -- axum routes, handlers, and the request-logging middleware
//! that feeds the detection engine.

mod error;
pub mod middleware;
mod routes;
pub mod state;

pub use self::error::ApiError;

use self::state::AppState;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(routes::health))
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::record_request,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "data": { "message": "SentinelAI API Gateway Running" } }))
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
