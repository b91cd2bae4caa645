use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::detect::DetectError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Detect(DetectError::StoreUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
            ApiError::Detect(DetectError::ModelUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable")
            }
            ApiError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        error!(error = %self, kind, "request failed");
        (
            status,
            Json(json!({ "error": { "kind": kind, "message": self.to_string() } })),
        )
            .into_response()
    }
}

/// Run blocking engine work off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DetectError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
