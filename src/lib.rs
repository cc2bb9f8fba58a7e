//! # rushia-dl
//!
//! Media download service: accepts download requests for a video host, runs
//! them under a bounded concurrency budget and reports live progress until
//! completion or failure.
//!
//! ## Design
//!
//! - **No queue** - a request either gets an admission slot immediately or is
//!   rejected with [`Error::Overloaded`]
//! - **Poll, don't wait** - submission returns a task id at once; the download
//!   runs in the background and its state is read with
//!   [`MediaDownloader::status`]
//! - **Ephemeral state** - tasks, finished files and uploaded cookie files all
//!   expire and are deleted by the retention sweeper
//! - **Pluggable engine** - the default engine drives the `yt-dlp` CLI; anything
//!   implementing [`MediaEngine`] can replace it
//!
//! ## Quick Start
//!
//! ```no_run
//! use rushia_dl::{Config, DownloadRequest, MediaDownloader, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!     downloader.start_sweeper().await;
//!
//!     let task = downloader
//!         .submit(DownloadRequest::new(
//!             "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!             OutputFormat::M4a,
//!         ))
//!         .await?;
//!
//!     loop {
//!         let info = downloader.status(&task.task_id).await?;
//!         println!("{} {:.1}%", info.status, info.progress);
//!         if info.status.is_terminal() {
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//!
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Admission gate bounding concurrent downloads
pub mod admission;
/// REST API module
pub mod api;
/// Engine failure classification
pub mod classifier;
/// Configuration types
pub mod config;
/// Single-use cookie file storage
pub mod credentials;
/// Download orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Download engine boundary and the yt-dlp implementation
pub mod engine;
/// Error types
pub mod error;
/// Progress events and the task state machine
pub mod progress;
/// In-memory task registry
pub mod registry;
/// Periodic retention sweep
pub mod sweeper;
/// Core types
pub mod types;

// Re-export commonly used types
pub use classifier::{ClassifiedError, ErrorCategory, classify};
pub use config::Config;
pub use downloader::MediaDownloader;
pub use engine::{CliEngine, MediaEngine};
pub use error::{ApiError, EngineError, Error, ErrorDetail, Result, ToHttpStatus};
pub use progress::ProgressEvent;
pub use sweeper::{RetentionSweeper, SweepReport};
pub use types::{
    CredentialId, DownloadRequest, OutputFormat, ServerStatus, Status, TaskId, TaskInfo,
};

/// Run the service until a termination signal, then shut down gracefully.
///
/// Starts the retention sweeper and the API server, waits for a signal (or
/// for the server to stop on its own) and calls
/// [`MediaDownloader::shutdown`]. The server keeps answering status polls
/// while active downloads drain, then stops gracefully.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use rushia_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    downloader.start_sweeper().await;
    let stop_server = tokio_util::sync::CancellationToken::new();
    let mut server = downloader.spawn_api_server(stop_server.clone());

    let server_result = tokio::select! {
        _ = wait_for_signal() => None,
        joined = &mut server => Some(joined),
    };

    let shutdown = downloader.shutdown().await;

    stop_server.cancel();
    let server_result = match server_result {
        Some(joined) => joined,
        None => server.await,
    };

    match server_result {
        Ok(Err(e)) => {
            tracing::error!(error = %e, "API server failed");
            Err(e)
        }
        Err(e) => {
            tracing::error!(error = %e, "API server task panicked");
            Err(Error::ApiServerError(e.to_string()))
        }
        _ => shutdown,
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
