//! Download orchestrator split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`validation`] - Source URL validation and playlist-parameter stripping
//! - [`submit`] - Admission, liveness pre-check and task creation
//! - [`attempt`] - Background download attempt and artifact verification
//! - [`artifacts`] - Locating, counting and serving finished files
//! - [`status`] - Task and server status queries
//! - [`cookies`] - Credential upload and deletion
//! - [`lifecycle`] - Retention sweeper startup and graceful shutdown

pub(crate) mod artifacts;
mod attempt;
mod cookies;
mod lifecycle;
mod status;
mod submit;
pub mod validation;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::credentials::CredentialVault;
use crate::engine::{self, MediaEngine};
use crate::error::{Error, Result};
use crate::registry::TaskRegistry;
use crate::sweeper::{RetentionSweeper, SweeperHandle};

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Task state shared with attempts and the sweeper
    pub(crate) registry: TaskRegistry,
    /// Bounds concurrently running attempts (max_concurrent_downloads)
    pub(crate) gate: AdmissionGate,
    /// Uploaded cookie files
    pub(crate) vault: Arc<CredentialVault>,
    /// Download engine (trait object for pluggable implementations)
    pub(crate) engine: Arc<dyn MediaEngine>,
    /// Flag to indicate whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Running retention sweeper, if started
    pub(crate) sweeper_handle: Arc<tokio::sync::Mutex<Option<SweeperHandle>>>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// Validates the configuration, creates the download and cookie
    /// directories, and selects the download engine (configured yt-dlp path,
    /// then PATH).
    pub async fn new(config: Config) -> Result<Self> {
        let engine = engine::select(&config.engine);
        Self::with_engine(config, engine).await
    }

    /// Create a MediaDownloader driving a specific engine
    pub async fn with_engine(config: Config, engine: Arc<dyn MediaEngine>) -> Result<Self> {
        config.validate()?;

        // Ensure the download directory exists
        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let vault = CredentialVault::open(&config.credentials.cookie_dir).await?;

        tracing::info!(
            engine = engine.name(),
            max_concurrent_downloads = config.download.max_concurrent_downloads,
            download_dir = %config.download.download_dir.display(),
            "Media downloader initialized"
        );

        Ok(Self {
            gate: AdmissionGate::new(config.download.max_concurrent_downloads),
            config: Arc::new(config),
            registry: TaskRegistry::new(),
            vault: Arc::new(vault),
            engine,
            accepting_new: Arc::new(AtomicBool::new(true)),
            sweeper_handle: Arc::new(tokio::sync::Mutex::new(None)),
        })
    }

    /// Configuration this instance runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name of the engine in use
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Retention sweeper over this instance's state
    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            self.registry.clone(),
            self.vault.clone(),
            self.config.download.download_dir.clone(),
            self.config.retention.clone(),
        )
    }

    /// Spawn the API server in a background task
    ///
    /// The returned handle resolves once `shutdown` is cancelled and in-flight
    /// requests are answered, or when the server fails.
    pub fn spawn_api_server(
        &self,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(
            async move { crate::api::start_api_server(downloader, config, shutdown).await },
        )
    }
}
