//! Parser for yt-dlp output
//!
//! The CLI engine asks yt-dlp to print progress and the final result as
//! JSON behind fixed markers, one record per line:
//!
//! ```text
//! __PROGRESS__ {"status": "downloading", "downloaded_bytes": 1024, ...}
//! __POSTPROCESS__ {"status": "started", "postprocessor": "ExtractAudio", ...}
//! __RESULT__ {"id": "abc", "title": "Song", "filepath": "/dl/Song-abc.m4a"}
//! ```
//!
//! Anything else is either an `ERROR:` line or noise.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::traits::{EngineOutput, ProbeInfo};
use crate::error::EngineError;
use crate::progress::{DownloadProgress, ProgressEvent};

pub(crate) const PROGRESS_MARKER: &str = "__PROGRESS__";
pub(crate) const POSTPROCESS_MARKER: &str = "__POSTPROCESS__";
pub(crate) const RESULT_MARKER: &str = "__RESULT__";

static ERROR_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*ERROR:\s*(?P<message>.+?)\s*$").ok());

/// One meaningful line of engine output
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    /// Progress callback
    Progress(ProgressEvent),
    /// Final result record
    Result(EngineOutput),
    /// Failure reported by the engine
    Error(String),
}

#[derive(Deserialize)]
struct RawDownloadProgress {
    status: String,
    #[serde(default)]
    downloaded_bytes: Option<f64>,
    #[serde(default)]
    total_bytes: Option<f64>,
    #[serde(default)]
    total_bytes_estimate: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    eta: Option<f64>,
    #[serde(default)]
    elapsed: Option<f64>,
    #[serde(default)]
    fragment_index: Option<f64>,
    #[serde(default)]
    fragment_count: Option<f64>,
}

#[derive(Deserialize)]
struct RawPostprocess {
    status: String,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    filepath: Option<String>,
}

fn whole(value: Option<f64>) -> Option<u64> {
    value.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)
}

/// Parse one line of engine output
///
/// Returns `None` for lines that carry nothing the orchestrator needs,
/// including marker lines whose JSON cannot be decoded.
pub fn parse_line(line: &str) -> Option<EngineLine> {
    let line = line.trim();

    if let Some(json) = line.strip_prefix(PROGRESS_MARKER) {
        let raw: RawDownloadProgress = serde_json::from_str(json.trim()).ok()?;
        return match raw.status.as_str() {
            "downloading" => Some(EngineLine::Progress(ProgressEvent::Downloading(
                DownloadProgress {
                    downloaded_bytes: whole(raw.downloaded_bytes),
                    total_bytes: whole(raw.total_bytes),
                    total_bytes_estimate: whole(raw.total_bytes_estimate),
                    speed: raw.speed.filter(|s| s.is_finite()),
                    eta: whole(raw.eta),
                    elapsed: raw.elapsed.filter(|e| e.is_finite()),
                    fragment_index: whole(raw.fragment_index),
                    fragment_count: whole(raw.fragment_count),
                },
            ))),
            "finished" => Some(EngineLine::Progress(ProgressEvent::Finished)),
            _ => None,
        };
    }

    if let Some(json) = line.strip_prefix(POSTPROCESS_MARKER) {
        let raw: RawPostprocess = serde_json::from_str(json.trim()).ok()?;
        return match raw.status.as_str() {
            "started" => Some(EngineLine::Progress(ProgressEvent::PostprocessStarted)),
            "finished" => Some(EngineLine::Progress(ProgressEvent::PostprocessFinished)),
            _ => None,
        };
    }

    if let Some(json) = line.strip_prefix(RESULT_MARKER) {
        let raw: RawResult = serde_json::from_str(json.trim()).ok()?;
        return Some(EngineLine::Result(EngineOutput {
            id: raw.id.unwrap_or_default(),
            title: raw.title.unwrap_or_default(),
            filepath: raw.filepath.filter(|p| !p.is_empty()).map(PathBuf::from),
        }));
    }

    let captures = ERROR_LINE.as_ref()?.captures(line)?;
    Some(EngineLine::Error(captures["message"].to_string()))
}

/// Parse the JSON document printed by a metadata-only run
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeInfo, EngineError> {
    let text = String::from_utf8_lossy(stdout);
    // Playlist-less single JSON document; take the last non-empty line in case of stray output
    let json = text
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| EngineError::new("probe produced no metadata"))?;

    serde_json::from_str(json)
        .map_err(|e| EngineError::new(format!("failed to parse probe metadata: {}", e)))
}

/// Failure text for an unsuccessful run
///
/// Prefers the last `ERROR:` line, then the last non-empty stderr line,
/// then a generic exit status message.
pub fn failure_message(last_error: Option<&str>, stderr_tail: &[String], code: Option<i32>) -> String {
    if let Some(error) = last_error {
        return error.to_string();
    }
    if let Some(line) = stderr_tail.iter().rev().find(|l| !l.trim().is_empty()) {
        return line.trim().to_string();
    }
    match code {
        Some(code) => format!("yt-dlp exited with status {}", code),
        None => "yt-dlp was terminated by a signal".to_string(),
    }
}
