//! Error types for rushia-dl
//!
//! This module provides the error taxonomy of the service:
//! - Submission-time errors returned synchronously to callers
//!   (invalid input, overload, live/upcoming targets)
//! - The free-text failure type of the download engine boundary
//! - HTTP status code mapping and structured JSON error bodies for the API

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for rushia-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rushia-dl
///
/// Only errors that happen before a task id has been handed out are returned
/// through this type. Failures of a running download attempt are recorded on
/// the task itself (see [`crate::types::TaskError`]) and discovered by polling.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unsupported request (unknown host, unsupported format, empty credential)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every admission slot is taken; the caller should retry later
    #[error("server busy: {active}/{max} downloads in progress, try again later")]
    Overloaded {
        /// Number of slots in use when the request was denied
        active: usize,
        /// Configured maximum number of concurrent downloads
        max: usize,
    },

    /// Target is a live broadcast or a scheduled premiere that has not ended yet
    #[error("\"{title}\" is {live_status}; try again after the broadcast has ended")]
    NotAvailableYet {
        /// Title reported by the liveness probe
        title: String,
        /// Human-readable live state ("live now" or "scheduled")
        live_status: String,
    },

    /// Task, credential or artifact not found (unknown id or already swept)
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Download engine failure surfaced synchronously (engine unavailable, probe misuse)
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Failure reported by the download engine
///
/// The engine contract carries nothing but free text; the error classifier
/// turns it into a stable category when the failure is recorded on a task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    /// Raw failure text as reported by the engine
    pub message: String,
}

impl EngineError {
    /// Create an engine error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "overloaded",
///     "message": "server busy: 5/5 downloads in progress, try again later",
///     "details": { "active_downloads": 5, "max_concurrent_downloads": 5 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_input")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create an "invalid input" error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new("invalid_input", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::Config { .. } => 400,
            Error::NotFound(_) => 404,
            // The target exists but is not downloadable in its current state
            Error::NotAvailableYet { .. } => 409,
            Error::Overloaded { .. } => 503,
            Error::ShuttingDown => 503,
            Error::Engine(_) => 502,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Overloaded { .. } => "overloaded",
            Error::NotAvailableYet { .. } => "not_available_yet",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Engine(_) => "engine_error",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Overloaded { active, max } => Some(serde_json::json!({
                "active_downloads": active,
                "max_concurrent_downloads": max,
            })),
            Error::NotAvailableYet { title, live_status } => Some(serde_json::json!({
                "title": title,
                "live_status": live_status,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
