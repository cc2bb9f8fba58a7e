//! System handlers: health, server status, OpenAPI.

use crate::api::AppState;
use crate::types::ServerStatus;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.downloader.engine_name(),
        "accepting": state.downloader.is_accepting(),
    }))
}

/// GET /api/server-status - Slots, timeouts, cached files and running tasks
#[utoipa::path(
    get,
    path = "/api/server-status",
    tag = "system",
    responses(
        (status = 200, description = "Current server status", body = ServerStatus)
    )
)]
pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    Json(state.downloader.server_status().await)
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
