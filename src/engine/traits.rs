//! Traits and types for the download engine boundary

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::progress::ProgressEvent;
use crate::types::OutputFormat;

/// Metadata-only resolution of a target
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// Cleaned source URL
    pub url: String,
    /// Cookie file to authenticate with
    pub credential: Option<PathBuf>,
}

/// Live state of a target that cannot be downloaded yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// Broadcasting right now
    Live,
    /// Scheduled premiere or stream that has not started
    Upcoming,
}

impl LiveState {
    /// Human-readable description used in error messages
    pub fn describe(self) -> &'static str {
        match self {
            LiveState::Live => "live now",
            LiveState::Upcoming => "scheduled and has not started",
        }
    }
}

/// Result of a liveness probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProbeInfo {
    /// Media title
    #[serde(default)]
    pub title: Option<String>,
    /// Whether the host flags the target as live
    #[serde(default)]
    pub is_live: Option<bool>,
    /// Host live status ("is_live", "is_upcoming", "was_live", "not_live", ...)
    #[serde(default)]
    pub live_status: Option<String>,
}

impl ProbeInfo {
    /// Live state that blocks downloading, if any
    pub fn live_state(&self) -> Option<LiveState> {
        match self.live_status.as_deref() {
            Some("is_upcoming") => Some(LiveState::Upcoming),
            Some("is_live") => Some(LiveState::Live),
            _ if self.is_live == Some(true) => Some(LiveState::Live),
            _ => None,
        }
    }
}

/// One download attempt handed to the engine
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Cleaned source URL
    pub url: String,
    /// Requested output kind
    pub format: OutputFormat,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
    /// Cookie file to authenticate with
    pub credential: Option<PathBuf>,
}

/// What the engine reports after a successful run
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// Host media id
    pub id: String,
    /// Media title
    pub title: String,
    /// Path the engine says it wrote, before any extension change
    pub filepath: Option<PathBuf>,
}

/// Download engine
///
/// Implementations resolve and download one target per call. Progress is
/// reported through `events` in the order it happens; failures carry only
/// free text, which the orchestrator classifies.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Resolve a target's metadata without downloading it
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeInfo, EngineError>;

    /// Download a target, emitting progress events until it returns
    async fn download(
        &self,
        request: &EngineRequest,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Result<EngineOutput, EngineError>;

    /// Name of this engine implementation
    fn name(&self) -> &'static str;
}
