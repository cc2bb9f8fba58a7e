//! Core types for rushia-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::classifier::ErrorCategory;
use crate::config::TaskTimeouts;
use crate::error::Error;

/// Fresh random handle in the hyphenated UUID v4 layout
fn random_handle() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Unique identifier for a download task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random task id
    pub fn generate() -> Self {
        Self(random_handle())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to an uploaded credential (cookie) file
///
/// The handle doubles as the file stem inside the cookie directory, so only
/// values with the generated shape are ever accepted from callers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    /// Generate a fresh random credential handle
    pub fn generate() -> Self {
        Self(random_handle())
    }

    /// Parse a caller-supplied handle, rejecting anything that is not a UUID
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::try_parse(raw.trim())
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    /// Borrow the handle as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Accepted, waiting for the worker to start the engine
    Pending,
    /// Engine is transferring media
    Downloading,
    /// Transfer finished, post-processing (extract/merge) running
    Processing,
    /// Artifact written and verified
    Completed,
    /// Failed with a classified error
    Error,
}

impl Status {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Error)
    }

    /// Whether `self -> next` is an edge of the task state machine
    ///
    /// Non-terminal states may repeat themselves (progress updates) and may
    /// always fail; terminal states accept nothing.
    pub fn can_transition_to(self, next: Status) -> bool {
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (from, to) if from == to => true,
            (_, Status::Error) => true,
            (Status::Pending, Status::Downloading) => true,
            (Status::Downloading, Status::Processing) => true,
            (Status::Processing, Status::Completed) => true,
            _ => false,
        }
    }

    /// Lowercase wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Downloading => "downloading",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested output kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Audio only, AAC in an m4a container
    #[serde(alias = "audio")]
    M4a,
    /// Video with audio, merged into mp4
    #[serde(alias = "video")]
    Mp4,
}

impl OutputFormat {
    /// File extension (without dot) of the finished artifact
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::M4a => "m4a",
            OutputFormat::Mp4 => "mp4",
        }
    }

    /// Content type served for the finished artifact
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::M4a => "audio/mp4",
            OutputFormat::Mp4 => "video/mp4",
        }
    }

    /// Format whose artifacts carry `extension`
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "m4a" => Some(OutputFormat::M4a),
            "mp4" => Some(OutputFormat::Mp4),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m4a" | "audio" => Ok(OutputFormat::M4a),
            "mp4" | "video" => Ok(OutputFormat::Mp4),
            other => Err(Error::InvalidInput(format!(
                "unsupported format '{other}', expected m4a or mp4"
            ))),
        }
    }
}

/// Live transfer metrics, present only while a task is downloading
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransferMetrics {
    /// Current speed in bytes per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Estimated seconds remaining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
    /// Bytes written so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_bytes: Option<u64>,
    /// Total bytes, exact or estimated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Seconds since the transfer started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    /// Index of the fragment being fetched (segmented streams)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_index: Option<u64>,
    /// Number of fragments (segmented streams)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_count: Option<u64>,
}

/// Classified failure recorded on a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskError {
    /// Stable category callers can branch on
    pub category: ErrorCategory,
    /// Human-readable description
    pub message: String,
}

/// One tracked download attempt
#[derive(Clone, Debug)]
pub struct Task {
    /// Task identifier
    pub id: TaskId,
    /// Cleaned source URL
    pub url: String,
    /// Requested output kind
    pub format: OutputFormat,
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f64,
    /// Transfer metrics (only while downloading)
    pub metrics: Option<TransferMetrics>,
    /// Artifact file name (set on completion)
    pub filename: Option<String>,
    /// Media title (set on completion)
    pub title: Option<String>,
    /// Failure (set on error)
    pub error: Option<TaskError>,
    /// When the task was accepted
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// New task in `pending` with zero progress
    pub fn new(id: TaskId, url: String, format: OutputFormat, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url,
            format,
            status: Status::Pending,
            progress: 0.0,
            metrics: None,
            filename: None,
            title: None,
            error: None,
            created_at,
        }
    }

    /// Caller-facing snapshot
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            task_id: self.id.clone(),
            url: self.url.clone(),
            format: self.format,
            status: self.status,
            progress: self.progress,
            metrics: self.metrics.clone(),
            filename: self.filename.clone(),
            title: self.title.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
        }
    }

    /// Summary used in the server status listing
    pub fn summary(&self) -> ActiveTaskSummary {
        ActiveTaskSummary {
            task_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            url: self.url.clone(),
        }
    }
}

/// Task state returned by submission and status queries
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskInfo {
    /// Task identifier
    pub task_id: TaskId,
    /// Cleaned source URL
    pub url: String,
    /// Requested output kind
    pub format: OutputFormat,
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f64,
    /// Transfer metrics while downloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TransferMetrics>,
    /// Artifact file name once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Media title once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Classified failure once errored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// When the task was accepted
    pub created_at: DateTime<Utc>,
}

/// Non-terminal task as listed by the server status query
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveTaskSummary {
    /// Task identifier
    pub task_id: TaskId,
    /// Current status
    pub status: Status,
    /// Progress percentage
    pub progress: f64,
    /// Cleaned source URL
    pub url: String,
}

/// Service-wide status snapshot
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerStatus {
    /// Admission slots in use
    pub active_downloads: usize,
    /// Configured maximum concurrent downloads
    pub max_concurrent_downloads: usize,
    /// Admission slots free
    pub available_slots: usize,
    /// Artifact retention window in seconds
    pub file_retention_secs: u64,
    /// Task record lifetime per status, in seconds
    pub task_timeouts: TaskTimeouts,
    /// Artifacts currently in the download directory
    pub cached_files: usize,
    /// Tasks that have not reached a terminal status
    pub active_tasks: Vec<ActiveTaskSummary>,
    /// All task records held, terminal ones included
    pub total_tasks_in_memory: usize,
}

/// Submission request
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Source URL (youtube.com or youtu.be)
    pub url: String,
    /// Output kind: "m4a" (or "audio") / "mp4" (or "video")
    pub format: String,
    /// Handle of a previously uploaded cookie file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_id: Option<String>,
}

impl DownloadRequest {
    /// Request for `url` in `format` without credentials
    pub fn new(url: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            url: url.into(),
            format: format.extension().to_string(),
            cookie_id: None,
        }
    }

    /// Attach an uploaded credential handle
    pub fn with_cookie(mut self, cookie_id: &CredentialId) -> Self {
        self.cookie_id = Some(cookie_id.to_string());
        self
    }
}

/// Result of a credential upload
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CredentialUpload {
    /// Handle to pass as `cookie_id` on submission
    pub cookie_id: CredentialId,
    /// Confirmation text
    pub message: String,
}
