//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the rushia-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the rushia-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rushia-dl REST API",
        version = "0.2.0",
        description = "Submit media downloads, poll their progress and fetch the finished files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::submit_download,
        crate::api::routes::get_status,
        crate::api::routes::download_file,

        // Cookies
        crate::api::routes::upload_cookie,
        crate::api::routes::delete_cookie,

        // System
        crate::api::routes::health_check,
        crate::api::routes::server_status,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::CredentialId,
        crate::types::Status,
        crate::types::OutputFormat,
        crate::types::TransferMetrics,
        crate::types::TaskError,
        crate::types::TaskInfo,
        crate::types::ActiveTaskSummary,
        crate::types::ServerStatus,
        crate::types::DownloadRequest,
        crate::types::CredentialUpload,
        crate::classifier::ErrorCategory,

        // Config types from config.rs
        crate::config::TaskTimeouts,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Submit downloads, poll task status and fetch finished files"),
        (name = "cookies", description = "Single-use cookie files for age-restricted and members-only content"),
        (name = "system", description = "System endpoints - Health checks, server status, OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();

        for path in [
            "/api/download",
            "/api/status/{task_id}",
            "/api/download/{filename}",
            "/api/upload-cookie",
            "/api/cookie/{cookie_id}",
            "/api/server-status",
            "/health",
            "/openapi.json",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn spec_has_task_schemas() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("spec should have components");

        for schema in ["TaskInfo", "ServerStatus", "DownloadRequest", "ApiError", "ErrorCategory"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("rushia-dl REST API"));
    }
}
