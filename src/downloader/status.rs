//! Task and server status queries.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::{OutputFormat, ServerStatus, TaskId, TaskInfo};

use super::MediaDownloader;
use super::artifacts;

impl MediaDownloader {
    /// Current state of a task
    ///
    /// Fails with `NotFound` if the id is unknown or the task was swept.
    pub async fn status(&self, task_id: &TaskId) -> Result<TaskInfo> {
        self.registry
            .get(task_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
    }

    /// Service-wide status: slots, timeouts, cached files and running tasks
    pub async fn server_status(&self) -> ServerStatus {
        let retention = &self.config.retention;
        ServerStatus {
            active_downloads: self.gate.active(),
            max_concurrent_downloads: self.gate.max(),
            available_slots: self.gate.available(),
            file_retention_secs: retention.file_retention.as_secs(),
            task_timeouts: retention.task_timeouts.clone(),
            cached_files: artifacts::count(
                &self.config.download.download_dir,
                &retention.artifact_extensions,
            )
            .await,
            active_tasks: self.registry.active_tasks().await,
            total_tasks_in_memory: self.registry.len().await,
        }
    }

    /// Path and format of a finished artifact by file name
    ///
    /// Fails with `InvalidInput` for names that try to leave the download
    /// directory and `NotFound` if the file does not exist (or was swept).
    pub async fn artifact(&self, filename: &str) -> Result<(PathBuf, OutputFormat)> {
        artifacts::served_path(&self.config.download.download_dir, filename).await
    }
}
