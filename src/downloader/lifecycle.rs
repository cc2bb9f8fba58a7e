//! Retention sweeper startup and graceful shutdown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;

use super::MediaDownloader;

/// How long shutdown waits for running attempts
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MediaDownloader {
    /// Start the periodic retention sweeper
    ///
    /// Does nothing if it is already running.
    pub async fn start_sweeper(&self) {
        let mut handle = self.sweeper_handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("retention sweeper already running");
            return;
        }
        *handle = Some(self.sweeper().spawn());
    }

    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new downloads (`ShuttingDown`)
    /// 2. Stops the retention sweeper
    /// 3. Waits up to 30 seconds for running attempts to release their slots
    ///
    /// Running engine processes are not interrupted; attempts still running
    /// when the timeout elapses are abandoned with the process.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new downloads
        self.accepting_new.store(false, Ordering::SeqCst);
        self.gate.close();
        tracing::info!("Stopped accepting new downloads");

        // 2. Stop the sweeper
        if let Some(handle) = self.sweeper_handle.lock().await.take() {
            handle.stop().await;
        }

        // 3. Wait for active attempts
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_downloads()).await {
            Ok(()) => tracing::info!("All active downloads finished"),
            Err(_) => tracing::warn!(
                active = self.gate.active(),
                "Timeout waiting for downloads to finish, proceeding with shutdown"
            ),
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_downloads(&self) {
        loop {
            let active = self.gate.active();
            if active == 0 {
                return;
            }
            tracing::debug!(active, "Waiting for active downloads to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Whether new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
