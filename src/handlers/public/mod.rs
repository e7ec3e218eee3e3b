// handlers/public/mod.rs - Operational endpoints and fallbacks

use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;

/// GET / and GET /{prefix}/{version}/
pub async fn ok() -> Json<&'static str> {
    Json("OK")
}

/// GET /health - 200 when the data store answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }))),
        Err(e) => {
            warn!("Health check failed: {}", e);
            Err(ApiError::service_unavailable("database unavailable"))
        }
    }
}

/// Unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}

/// Known route, unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
