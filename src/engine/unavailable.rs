//! Engine placeholder used when yt-dlp cannot be found

use super::traits::{EngineOutput, EngineRequest, MediaEngine, ProbeInfo, ProbeRequest};
use crate::error::EngineError;
use crate::progress::ProgressEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

const UNAVAILABLE: &str = "no download engine available: install yt-dlp or set engine.binary_path";

/// Engine that fails every call
///
/// Lets the service start (and serve status, credentials and finished files)
/// on a host without yt-dlp. Every download attempt ends in `error` with an
/// explanation instead of the process refusing to boot.
pub struct UnavailableEngine;

#[async_trait]
impl MediaEngine for UnavailableEngine {
    async fn probe(&self, _request: &ProbeRequest) -> Result<ProbeInfo, EngineError> {
        Err(EngineError::new(UNAVAILABLE))
    }

    async fn download(
        &self,
        _request: &EngineRequest,
        _events: mpsc::Sender<ProgressEvent>,
    ) -> Result<EngineOutput, EngineError> {
        Err(EngineError::new(UNAVAILABLE))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutputFormat;
    use std::path::PathBuf;

    #[tokio::test]
    async fn every_call_fails_with_install_hint() {
        let engine = UnavailableEngine;

        let probe = engine
            .probe(&ProbeRequest {
                url: "https://youtu.be/abc".into(),
                credential: None,
            })
            .await;
        assert!(probe.unwrap_err().message.contains("install yt-dlp"));

        let (tx, _rx) = mpsc::channel(1);
        let download = engine
            .download(
                &EngineRequest {
                    url: "https://youtu.be/abc".into(),
                    format: OutputFormat::Mp4,
                    output_dir: PathBuf::from("/tmp"),
                    credential: None,
                },
                tx,
            )
            .await;
        assert!(download.unwrap_err().message.contains("engine.binary_path"));
        assert_eq!(engine.name(), "unavailable");
    }
}
