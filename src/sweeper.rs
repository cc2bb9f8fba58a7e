//! Periodic retention sweep
//!
//! Every `sweep_interval` the sweeper:
//! - deletes artifacts older than `file_retention`, referenced by a task or not
//! - drops task records older than the timeout of their *current* status
//! - deletes credential files that were uploaded but never consumed
//!
//! A failure on one file or task is logged and skipped; it never aborts the cycle.
//!
//! # Example
//!
//! ```no_run
//! use rushia_dl::{MediaDownloader, config::Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = MediaDownloader::new(Config::default()).await?;
//! let report = downloader.sweeper().sweep_once().await;
//! println!("deleted {} file(s), {} task(s)", report.files_deleted, report.tasks_removed);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::credentials::CredentialVault;
use crate::downloader::artifacts;
use crate::registry::TaskRegistry;

/// Counts of what one sweep cycle deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Artifact files deleted
    pub files_deleted: usize,
    /// Task records removed
    pub tasks_removed: usize,
    /// Unconsumed credential files deleted
    pub credentials_deleted: usize,
}

impl SweepReport {
    /// Whether the cycle deleted anything
    pub fn is_empty(&self) -> bool {
        self.files_deleted == 0 && self.tasks_removed == 0 && self.credentials_deleted == 0
    }
}

/// Retention sweeper over the registry, the download directory and the credential vault
#[derive(Clone)]
pub struct RetentionSweeper {
    registry: TaskRegistry,
    vault: Arc<CredentialVault>,
    download_dir: PathBuf,
    retention: RetentionConfig,
}

/// Running sweeper loop
pub struct SweeperHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop to stop and wait for it to finish its current cycle
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "retention sweeper task ended abnormally");
        }
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl RetentionSweeper {
    /// Create a sweeper over shared service state
    pub fn new(
        registry: TaskRegistry,
        vault: Arc<CredentialVault>,
        download_dir: PathBuf,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            registry,
            vault,
            download_dir,
            retention,
        }
    }

    /// Run one cycle now
    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run one cycle as if the current time were `now`
    pub(crate) async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let now_system = SystemTime::from(now);

        let files_deleted = self.sweep_artifacts(now_system).await;
        let tasks_removed = self
            .registry
            .remove_expired(now, &self.retention.task_timeouts)
            .await
            .len();
        let credentials_deleted = self
            .vault
            .sweep_expired(self.retention.credential_retention, now_system)
            .await;

        let report = SweepReport {
            files_deleted,
            tasks_removed,
            credentials_deleted,
        };
        if report.is_empty() {
            debug!("retention sweep found nothing to delete");
        } else {
            info!(
                files = report.files_deleted,
                tasks = report.tasks_removed,
                credentials = report.credentials_deleted,
                "retention sweep complete"
            );
        }
        report
    }

    async fn sweep_artifacts(&self, now: SystemTime) -> usize {
        let files = match artifacts::list(&self.download_dir, &self.retention.artifact_extensions).await
        {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = ?self.download_dir, error = %e, "failed to list download directory");
                return 0;
            }
        };

        let mut deleted = 0;
        for file in files {
            let age = now.duration_since(file.modified).unwrap_or_default();
            if age <= self.retention.file_retention {
                continue;
            }
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => {
                    debug!(file = %file.name, age_secs = age.as_secs(), "deleted expired artifact");
                    deleted += 1;
                }
                Err(e) => warn!(file = %file.name, error = %e, "failed to delete expired artifact"),
            }
        }
        deleted
    }

    /// Sweep every `sweep_interval` until `cancel` fires
    ///
    /// The first cycle runs one interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.retention.sweep_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_secs = period.as_secs(),
            file_retention_secs = self.retention.file_retention.as_secs(),
            "retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }

        info!("retention sweeper stopped");
    }

    /// Start the loop on the runtime
    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.run(cancel.clone()));
        SweeperHandle { cancel, handle }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::progress;
    use crate::types::{OutputFormat, Status, Task, TaskId};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        download_dir: PathBuf,
        registry: TaskRegistry,
        vault: Arc<CredentialVault>,
        sweeper: RetentionSweeper,
    }

    async fn fixture(retention: RetentionConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let download_dir = dir.path().join("download");
        std::fs::create_dir_all(&download_dir).unwrap();
        let registry = TaskRegistry::new();
        let vault = Arc::new(CredentialVault::open(dir.path().join(".cookies")).await.unwrap());
        let sweeper = RetentionSweeper::new(
            registry.clone(),
            vault.clone(),
            download_dir.clone(),
            retention,
        );
        Fixture {
            _dir: dir,
            download_dir,
            registry,
            vault,
            sweeper,
        }
    }

    fn task(id: &str, created_at: DateTime<Utc>) -> Task {
        Task::new(TaskId::from(id), "https://youtu.be/x".into(), OutputFormat::M4a, created_at)
    }

    fn write_aged(path: &std::path::Path, age: Duration) {
        let file = std::fs::File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    // ── Task records ──

    #[tokio::test]
    async fn removes_only_tasks_past_their_status_timeout() {
        let f = fixture(RetentionConfig::default()).await;
        let now = Utc::now();
        let two_hours_ago = now - chrono::Duration::hours(2);

        f.registry.insert(task("failed", two_hours_ago)).await;
        f.registry
            .update(&TaskId::from("failed"), |t| progress::mark_failed(t, classify("boom")))
            .await;
        f.registry.insert(task("running", two_hours_ago)).await;
        f.registry
            .update(&TaskId::from("running"), |t| t.status = Status::Downloading)
            .await;

        let report = f.sweeper.sweep_at(now).await;

        assert_eq!(report.tasks_removed, 1);
        assert!(!f.registry.contains(&TaskId::from("failed")).await);
        assert!(f.registry.contains(&TaskId::from("running")).await);
    }

    // ── Artifacts ──

    #[tokio::test]
    async fn deletes_expired_artifacts_only() {
        let f = fixture(RetentionConfig::default()).await;
        write_aged(&f.download_dir.join("old-a.m4a"), Duration::from_secs(4 * 3600));
        write_aged(&f.download_dir.join("fresh-b.mp4"), Duration::from_secs(60));
        write_aged(&f.download_dir.join("old-c.part"), Duration::from_secs(4 * 3600));

        let report = f.sweeper.sweep_once().await;

        assert_eq!(report.files_deleted, 1);
        assert!(!f.download_dir.join("old-a.m4a").exists());
        assert!(f.download_dir.join("fresh-b.mp4").exists());
        // Not a managed artifact extension
        assert!(f.download_dir.join("old-c.part").exists());
    }

    #[tokio::test]
    async fn missing_download_dir_does_not_abort_cycle() {
        let f = fixture(RetentionConfig::default()).await;
        std::fs::remove_dir_all(&f.download_dir).unwrap();
        let now = Utc::now();
        f.registry
            .insert(task("stale", now - chrono::Duration::hours(2)))
            .await;

        let report = f.sweeper.sweep_at(now).await;

        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.tasks_removed, 1);
    }

    // ── Credentials ──

    #[tokio::test]
    async fn deletes_unconsumed_credentials_after_retention() {
        let f = fixture(RetentionConfig::default()).await;
        let id = f.vault.store(b"cookie").await.unwrap();

        let report = f.sweeper.sweep_at(Utc::now()).await;
        assert_eq!(report.credentials_deleted, 0);

        let report = f
            .sweeper
            .sweep_at(Utc::now() + chrono::Duration::hours(2))
            .await;
        assert_eq!(report.credentials_deleted, 1);
        assert!(f.vault.resolve(&id).await.is_none());
    }

    // ── Loop ──

    #[tokio::test]
    async fn loop_sweeps_on_interval_and_stops_on_cancel() {
        let retention = RetentionConfig {
            sweep_interval: Duration::from_millis(50),
            file_retention: Duration::from_secs(1),
            ..RetentionConfig::default()
        };
        let f = fixture(retention).await;
        write_aged(&f.download_dir.join("old-a.m4a"), Duration::from_secs(60));

        let handle = f.sweeper.clone().spawn();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!f.download_dir.join("old-a.m4a").exists());

        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("sweeper should stop promptly");
    }
}
