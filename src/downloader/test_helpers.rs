//! Shared test helpers for creating MediaDownloader instances in tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::engine::{EngineOutput, EngineRequest, MediaEngine, ProbeInfo, ProbeRequest};
use crate::error::EngineError;
use crate::progress::ProgressEvent;
use crate::types::{Status, TaskId, TaskInfo};

/// One scripted action of a fake download
#[derive(Debug)]
pub(crate) enum Step {
    /// Forward a progress event
    Emit(ProgressEvent),
    /// Create a file in the output directory
    WriteFile(String),
    /// Return success with this output
    Succeed(EngineOutput),
    /// Return an engine error with this text
    Fail(String),
    /// Panic inside the engine
    Panic,
}

/// Engine driven step by step from the test body
///
/// Each `download` call takes the oldest queued script and blocks on it, so a
/// test can observe task state between steps.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    probe: Mutex<Option<Result<ProbeInfo, EngineError>>>,
    scripts: Mutex<VecDeque<mpsc::UnboundedReceiver<Step>>>,
    /// Credential path passed to each download and whether it existed then
    pub(crate) credentials_seen: Mutex<Vec<(Option<PathBuf>, bool)>>,
    /// Number of probe calls
    pub(crate) probes: Mutex<usize>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every probe with `result`
    pub(crate) fn set_probe(&self, result: Result<ProbeInfo, EngineError>) {
        *self.probe.lock().unwrap() = Some(result);
    }

    /// Queue a script for the next download call
    pub(crate) fn script(&self) -> mpsc::UnboundedSender<Step> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn probe(&self, _request: &ProbeRequest) -> Result<ProbeInfo, EngineError> {
        *self.probes.lock().unwrap() += 1;
        self.probe
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(ProbeInfo::default()))
    }

    async fn download(
        &self,
        request: &EngineRequest,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Result<EngineOutput, EngineError> {
        let existed = request.credential.as_ref().is_some_and(|p| p.exists());
        self.credentials_seen
            .lock()
            .unwrap()
            .push((request.credential.clone(), existed));

        let script = self.scripts.lock().unwrap().pop_front();
        let Some(mut script) = script else {
            return Err(EngineError::new("no script queued"));
        };

        while let Some(step) = script.recv().await {
            match step {
                Step::Emit(event) => {
                    let _ = events.send(event).await;
                }
                Step::WriteFile(name) => {
                    std::fs::write(request.output_dir.join(name), b"media").unwrap();
                }
                Step::Succeed(output) => return Ok(output),
                Step::Fail(message) => return Err(EngineError::new(message)),
                Step::Panic => panic!("scripted engine panic"),
            }
        }
        Err(EngineError::new("script ended without an outcome"))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Helper to create a test MediaDownloader with a scripted engine.
/// Returns the downloader, the engine and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    max_concurrent: usize,
) -> (MediaDownloader, Arc<ScriptedEngine>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("download");
    config.download.max_concurrent_downloads = max_concurrent;
    config.credentials.cookie_dir = temp_dir.path().join(".cookies");

    let engine = ScriptedEngine::new();
    let downloader = MediaDownloader::with_engine(config, engine.clone())
        .await
        .unwrap();

    (downloader, engine, temp_dir)
}

/// Poll a task every 10ms until `check` holds, panicking after two seconds
pub(crate) async fn wait_for_task(
    downloader: &MediaDownloader,
    id: &TaskId,
    what: &str,
    check: impl Fn(&TaskInfo) -> bool,
) -> TaskInfo {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(info) = downloader.status(id).await {
            if check(&info) {
                return info;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until a task reaches `status`
pub(crate) async fn wait_for_status(downloader: &MediaDownloader, id: &TaskId, status: Status) -> TaskInfo {
    wait_for_task(downloader, id, status.as_str(), |info| info.status == status).await
}
