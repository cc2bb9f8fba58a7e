//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] — Submission, status polling and artifact retrieval
//! - [`cookies`] — Cookie file upload and deletion
//! - [`system`] — Health, server status, OpenAPI

mod cookies;
mod downloads;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use cookies::*;
pub use downloads::*;
pub use system::*;
