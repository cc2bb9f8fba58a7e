//! Progress tracking and the task state machine
//!
//! Engine callbacks arrive as [`ProgressEvent`]s and are folded into a
//! [`Task`] by [`apply`]. Completion and failure are not engine events: the
//! orchestrator records them with [`mark_completed`] and [`mark_failed`]
//! after it has verified the outcome.
//!
//! ```text
//! pending ──► downloading ──► processing ──► completed
//!    │             │               │
//!    └─────────────┴───────────────┴──────► error
//! ```

use crate::classifier::ClassifiedError;
use crate::types::{Status, Task, TaskError, TransferMetrics};

/// Highest percentage reported before the artifact is confirmed
pub const DOWNLOADING_CAP: f64 = 99.0;

/// Byte/fragment progress reported by the engine while transferring
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written so far
    pub downloaded_bytes: Option<u64>,
    /// Exact total size, when the host reports it
    pub total_bytes: Option<u64>,
    /// Estimated total size, used when the exact size is unknown
    pub total_bytes_estimate: Option<u64>,
    /// Current speed in bytes per second
    pub speed: Option<f64>,
    /// Estimated seconds remaining
    pub eta: Option<u64>,
    /// Seconds since the transfer started
    pub elapsed: Option<f64>,
    /// Index of the fragment being fetched
    pub fragment_index: Option<u64>,
    /// Number of fragments
    pub fragment_count: Option<u64>,
}

impl DownloadProgress {
    /// Percentage implied by this update, if it carries enough information
    ///
    /// Bytes are preferred; fragment counts are the fallback for segmented
    /// streams that do not report sizes.
    pub fn percent(&self) -> Option<f64> {
        let total = self.total_bytes.or(self.total_bytes_estimate).unwrap_or(0);
        let downloaded = self.downloaded_bytes.unwrap_or(0);
        if total > 0 && downloaded > 0 {
            return Some(downloaded as f64 / total as f64 * 100.0);
        }

        match (self.fragment_index, self.fragment_count) {
            (Some(index), Some(count)) if index > 0 && count > 0 => {
                Some(index as f64 / count as f64 * 100.0)
            }
            _ => None,
        }
    }

    fn metrics(&self) -> TransferMetrics {
        TransferMetrics {
            speed: self.speed,
            eta: self.eta,
            downloaded_bytes: self.downloaded_bytes,
            total_bytes: self.total_bytes.or(self.total_bytes_estimate),
            elapsed: self.elapsed,
            fragment_index: self.fragment_index,
            fragment_count: self.fragment_count,
        }
    }
}

/// Engine callback event
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Transfer progress update
    Downloading(DownloadProgress),
    /// Transfer of one stream finished
    Finished,
    /// A post-processor (audio extraction, merger) started
    PostprocessStarted,
    /// A post-processor finished
    PostprocessFinished,
}

/// Fold one engine event into `task`
///
/// Returns whether the task changed. Events for terminal tasks are ignored,
/// and any event promotes a `pending` task to `downloading` first. Progress is
/// not forced to be monotonic while downloading; a re-estimated total may
/// lower it.
pub fn apply(task: &mut Task, event: &ProgressEvent) -> bool {
    if task.status.is_terminal() {
        return false;
    }
    if task.status == Status::Pending {
        task.status = Status::Downloading;
    }

    match event {
        ProgressEvent::Downloading(update) => {
            // Second stream of a merged format; the task already left downloading
            if task.status == Status::Processing {
                return false;
            }
            if let Some(percent) = update.percent() {
                task.progress = percent.clamp(0.0, DOWNLOADING_CAP);
            }
            task.metrics = Some(update.metrics());
        }
        ProgressEvent::Finished => {
            enter_processing(task);
        }
        ProgressEvent::PostprocessStarted => {
            enter_processing(task);
        }
        ProgressEvent::PostprocessFinished => {
            enter_processing(task);
            task.progress = 100.0;
        }
    }
    true
}

fn enter_processing(task: &mut Task) {
    if task.status == Status::Downloading {
        task.status = Status::Processing;
    }
    task.progress = task.progress.max(DOWNLOADING_CAP);
    task.metrics = None;
}

/// Record a verified success
///
/// Walks any edges the engine never reported so the task always passes
/// through `downloading` and `processing`. Returns false if the task was
/// already terminal.
pub fn mark_completed(task: &mut Task, filename: String, title: String) -> bool {
    if task.status.is_terminal() {
        return false;
    }
    for next in [Status::Downloading, Status::Processing, Status::Completed] {
        if task.status.can_transition_to(next) {
            task.status = next;
        }
    }
    task.progress = 100.0;
    task.metrics = None;
    task.filename = Some(filename);
    task.title = Some(title);
    true
}

/// Record a terminal failure from whatever non-terminal state the task is in
///
/// Returns false if the task was already terminal.
pub fn mark_failed(task: &mut Task, error: ClassifiedError) -> bool {
    if task.status.is_terminal() {
        return false;
    }
    task.status = Status::Error;
    task.metrics = None;
    task.error = Some(TaskError {
        category: error.category,
        message: error.message,
    });
    true
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{classify, ErrorCategory};
    use crate::types::{OutputFormat, TaskId};
    use chrono::Utc;

    fn pending_task() -> Task {
        Task::new(
            TaskId::from("task-1"),
            "https://www.youtube.com/watch?v=abc".into(),
            OutputFormat::M4a,
            Utc::now(),
        )
    }

    fn bytes(downloaded: u64, total: u64) -> ProgressEvent {
        ProgressEvent::Downloading(DownloadProgress {
            downloaded_bytes: Some(downloaded),
            total_bytes: Some(total),
            speed: Some(1024.0),
            eta: Some(3),
            ..Default::default()
        })
    }

    // ── Percentage computation ──

    #[test]
    fn percent_prefers_bytes() {
        let update = DownloadProgress {
            downloaded_bytes: Some(25),
            total_bytes: Some(100),
            fragment_index: Some(9),
            fragment_count: Some(10),
            ..Default::default()
        };
        assert_eq!(update.percent(), Some(25.0));
    }

    #[test]
    fn percent_uses_estimate_when_total_unknown() {
        let update = DownloadProgress {
            downloaded_bytes: Some(50),
            total_bytes_estimate: Some(200),
            ..Default::default()
        };
        assert_eq!(update.percent(), Some(25.0));
    }

    #[test]
    fn percent_falls_back_to_fragments() {
        let update = DownloadProgress {
            fragment_index: Some(3),
            fragment_count: Some(4),
            ..Default::default()
        };
        assert_eq!(update.percent(), Some(75.0));
    }

    #[test]
    fn percent_is_none_without_information() {
        let update = DownloadProgress {
            downloaded_bytes: Some(10),
            ..Default::default()
        };
        assert_eq!(update.percent(), None);
    }

    // ── Transitions ──

    #[test]
    fn first_event_promotes_pending() {
        let mut task = pending_task();
        assert!(apply(&mut task, &bytes(10, 100)));
        assert_eq!(task.status, Status::Downloading);
        assert_eq!(task.progress, 10.0);
        assert_eq!(task.metrics.as_ref().unwrap().speed, Some(1024.0));
    }

    #[test]
    fn progress_without_information_keeps_previous_value() {
        let mut task = pending_task();
        apply(&mut task, &bytes(40, 100));
        apply(
            &mut task,
            &ProgressEvent::Downloading(DownloadProgress {
                speed: Some(1.0),
                ..Default::default()
            }),
        );
        assert_eq!(task.progress, 40.0);
    }

    #[test]
    fn downloading_progress_is_capped_below_100() {
        let mut task = pending_task();
        apply(&mut task, &bytes(100, 100));
        assert_eq!(task.progress, DOWNLOADING_CAP);

        apply(&mut task, &bytes(150, 100));
        assert_eq!(task.progress, DOWNLOADING_CAP);
    }

    #[test]
    fn re_estimated_total_may_lower_progress() {
        let mut task = pending_task();
        apply(&mut task, &bytes(50, 100));
        apply(&mut task, &bytes(50, 200));
        assert_eq!(task.progress, 25.0);
    }

    #[test]
    fn finished_moves_to_processing_and_clears_metrics() {
        let mut task = pending_task();
        apply(&mut task, &bytes(30, 100));
        apply(&mut task, &ProgressEvent::Finished);

        assert_eq!(task.status, Status::Processing);
        assert_eq!(task.progress, 99.0);
        assert!(task.metrics.is_none());
    }

    #[test]
    fn second_stream_does_not_move_status_backwards() {
        let mut task = pending_task();
        apply(&mut task, &bytes(100, 100));
        apply(&mut task, &ProgressEvent::Finished);

        assert!(!apply(&mut task, &bytes(1, 100)));
        assert_eq!(task.status, Status::Processing);
        assert_eq!(task.progress, 99.0);
        assert!(task.metrics.is_none());

        apply(&mut task, &ProgressEvent::Finished);
        assert_eq!(task.status, Status::Processing);
    }

    #[test]
    fn postprocess_started_is_idempotent_in_processing() {
        let mut task = pending_task();
        apply(&mut task, &ProgressEvent::Finished);
        apply(&mut task, &ProgressEvent::PostprocessStarted);
        apply(&mut task, &ProgressEvent::PostprocessStarted);
        assert_eq!(task.status, Status::Processing);
        assert_eq!(task.progress, 99.0);
    }

    #[test]
    fn postprocess_finished_sets_100_without_completing() {
        let mut task = pending_task();
        apply(&mut task, &ProgressEvent::Finished);
        apply(&mut task, &ProgressEvent::PostprocessStarted);
        apply(&mut task, &ProgressEvent::PostprocessFinished);

        assert_eq!(task.status, Status::Processing);
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn postprocess_from_downloading_enters_processing() {
        let mut task = pending_task();
        apply(&mut task, &bytes(10, 100));
        apply(&mut task, &ProgressEvent::PostprocessStarted);
        assert_eq!(task.status, Status::Processing);
        assert!(task.metrics.is_none());
    }

    // ── Terminal states ──

    #[test]
    fn completion_walks_every_edge() {
        let mut task = pending_task();
        assert!(mark_completed(&mut task, "Song-abc.m4a".into(), "Song".into()));

        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, 100.0);
        assert_eq!(task.filename.as_deref(), Some("Song-abc.m4a"));
        assert_eq!(task.title.as_deref(), Some("Song"));
    }

    #[test]
    fn failure_from_any_live_state() {
        for events in [
            vec![],
            vec![bytes(5, 10)],
            vec![bytes(5, 10), ProgressEvent::Finished],
        ] {
            let mut task = pending_task();
            for event in &events {
                apply(&mut task, event);
            }
            assert!(mark_failed(&mut task, classify("Private video")));
            assert_eq!(task.status, Status::Error);
            assert_eq!(task.error.as_ref().unwrap().category, ErrorCategory::Private);
            assert!(task.metrics.is_none());
        }
    }

    #[test]
    fn terminal_tasks_ignore_everything() {
        let mut task = pending_task();
        mark_completed(&mut task, "a.m4a".into(), "a".into());

        assert!(!apply(&mut task, &bytes(1, 100)));
        assert!(!apply(&mut task, &ProgressEvent::Finished));
        assert!(!mark_failed(&mut task, classify("network down")));
        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, 100.0);

        let mut failed = pending_task();
        mark_failed(&mut failed, classify("boom"));
        assert!(!mark_completed(&mut failed, "a.m4a".into(), "a".into()));
        assert_eq!(failed.status, Status::Error);
    }
}
