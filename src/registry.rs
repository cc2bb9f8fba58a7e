//! In-memory task registry
//!
//! All task state lives in one map behind a single `RwLock`. Writers are the
//! progress consumer and the orchestrator of each attempt, and the sweeper
//! when it drops expired records. Readers (status polls, server status) only
//! take the read lock and receive owned snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::TaskTimeouts;
use crate::progress::{self, ProgressEvent};
use crate::types::{ActiveTaskSummary, Task, TaskId, TaskInfo};

/// Shared map of task id to task state
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task, replacing any task with the same id
    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    /// Snapshot of one task
    pub async fn get(&self, id: &TaskId) -> Option<TaskInfo> {
        self.tasks.read().await.get(id).map(Task::info)
    }

    /// Whether the registry holds `id`
    pub async fn contains(&self, id: &TaskId) -> bool {
        self.tasks.read().await.contains_key(id)
    }

    /// Fold an engine event into a task
    ///
    /// Events for ids that were already swept are dropped; a removed task is
    /// never recreated. Returns whether the task changed.
    pub async fn apply_event(&self, id: &TaskId, event: &ProgressEvent) -> bool {
        match self.tasks.write().await.get_mut(id) {
            Some(task) => progress::apply(task, event),
            None => false,
        }
    }

    /// Mutate a task in place under the write lock
    ///
    /// Returns `None` if the task is not (or no longer) in the registry.
    pub async fn update<R>(&self, id: &TaskId, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        self.tasks.write().await.get_mut(id).map(f)
    }

    /// Remove every task older than the timeout of its current status
    ///
    /// Returns the removed ids.
    pub async fn remove_expired(&self, now: DateTime<Utc>, timeouts: &TaskTimeouts) -> Vec<TaskId> {
        let mut tasks = self.tasks.write().await;
        let expired: Vec<TaskId> = tasks
            .values()
            .filter(|task| {
                let age = (now - task.created_at).to_std().unwrap_or_default();
                age > timeouts.for_status(task.status)
            })
            .map(|task| task.id.clone())
            .collect();

        for id in &expired {
            tasks.remove(id);
        }
        expired
    }

    /// Summaries of tasks that have not reached a terminal status, oldest first
    pub async fn active_tasks(&self) -> Vec<ActiveTaskSummary> {
        let tasks = self.tasks.read().await;
        let mut active: Vec<&Task> = tasks.values().filter(|t| !t.status.is_terminal()).collect();
        active.sort_by_key(|t| t.created_at);
        active.into_iter().map(Task::summary).collect()
    }

    /// Number of task records held
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether no task records are held
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::types::{OutputFormat, Status};
    use std::time::Duration;

    fn task_created(id: &str, created_at: DateTime<Utc>) -> Task {
        Task::new(
            TaskId::from(id),
            format!("https://youtu.be/{id}"),
            OutputFormat::M4a,
            created_at,
        )
    }

    #[tokio::test]
    async fn insert_then_get_returns_snapshot() {
        let registry = TaskRegistry::new();
        registry.insert(task_created("a", Utc::now())).await;

        let info = registry.get(&TaskId::from("a")).await.unwrap();
        assert_eq!(info.status, Status::Pending);
        assert!(registry.get(&TaskId::from("missing")).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn events_for_unknown_ids_are_dropped() {
        let registry = TaskRegistry::new();
        assert!(!registry
            .apply_event(&TaskId::from("gone"), &ProgressEvent::Finished)
            .await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn apply_event_updates_task() {
        let registry = TaskRegistry::new();
        registry.insert(task_created("a", Utc::now())).await;

        assert!(registry
            .apply_event(&TaskId::from("a"), &ProgressEvent::Finished)
            .await);
        let info = registry.get(&TaskId::from("a")).await.unwrap();
        assert_eq!(info.status, Status::Processing);
    }

    #[tokio::test]
    async fn sweep_uses_timeout_of_current_status() {
        let registry = TaskRegistry::new();
        let timeouts = TaskTimeouts::default();
        let now = Utc::now();
        let two_hours_ago = now - chrono::Duration::hours(2);

        // error for 2h > 1h error timeout: removed
        registry.insert(task_created("failed", two_hours_ago)).await;
        registry
            .update(&TaskId::from("failed"), |t| {
                progress::mark_failed(t, classify("boom"))
            })
            .await;

        // downloading for 2h < 6h downloading timeout: kept
        registry.insert(task_created("running", two_hours_ago)).await;
        registry
            .update(&TaskId::from("running"), |t| t.status = Status::Downloading)
            .await;

        let removed = registry.remove_expired(now, &timeouts).await;

        assert_eq!(removed, vec![TaskId::from("failed")]);
        assert!(registry.contains(&TaskId::from("running")).await);
        assert!(!registry.contains(&TaskId::from("failed")).await);
    }

    #[tokio::test]
    async fn status_change_moves_the_deadline() {
        let registry = TaskRegistry::new();
        let timeouts = TaskTimeouts {
            pending: Duration::from_secs(60),
            ..TaskTimeouts::default()
        };
        let now = Utc::now();
        registry
            .insert(task_created("a", now - chrono::Duration::minutes(5)))
            .await;

        // Downloading (6h) keeps a 5 minute old task that pending (1 min) would drop
        registry
            .update(&TaskId::from("a"), |t| t.status = Status::Downloading)
            .await;
        assert!(registry.remove_expired(now, &timeouts).await.is_empty());

        registry
            .update(&TaskId::from("a"), |t| t.status = Status::Pending)
            .await;
        assert_eq!(registry.remove_expired(now, &timeouts).await.len(), 1);
    }

    #[tokio::test]
    async fn active_tasks_excludes_terminal() {
        let registry = TaskRegistry::new();
        let now = Utc::now();
        registry.insert(task_created("old", now - chrono::Duration::minutes(1))).await;
        registry.insert(task_created("new", now)).await;
        registry.insert(task_created("done", now)).await;
        registry
            .update(&TaskId::from("done"), |t| {
                progress::mark_completed(t, "done.m4a".into(), "done".into())
            })
            .await;

        let active = registry.active_tasks().await;
        let ids: Vec<&str> = active.iter().map(|s| s.task_id.as_str()).collect();
        assert_eq!(ids, vec!["old", "new"]);
        assert_eq!(registry.len().await, 3);
    }
}
