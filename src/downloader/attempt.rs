//! Background download attempt: engine run, progress wiring, verification.

use tokio::sync::mpsc;

use crate::admission::AdmissionPermit;
use crate::classifier::{self, ClassifiedError};
use crate::engine::{EngineOutput, EngineRequest};
use crate::progress;
use crate::types::{CredentialId, Status, TaskId};

use super::MediaDownloader;
use super::artifacts;

/// Progress events buffered between the engine and the registry
const EVENT_BUFFER: usize = 64;

/// Everything one attempt owns until it ends
pub(crate) struct Attempt {
    pub(crate) task_id: TaskId,
    pub(crate) request: EngineRequest,
    pub(crate) credential: Option<CredentialId>,
    pub(crate) permit: AdmissionPermit,
}

/// Terminal outcome computed before it is written to the registry
enum Outcome {
    Completed { filename: String, title: String },
    Failed(ClassifiedError),
}

impl MediaDownloader {
    /// Run an attempt on the runtime
    pub(crate) fn spawn_attempt(&self, attempt: Attempt) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        tokio::spawn(async move { downloader.run_attempt(attempt).await })
    }

    /// Drive one attempt to a terminal status
    ///
    /// The credential is disposed and the admission slot released before the
    /// terminal status becomes visible, so a poller that sees `completed` or
    /// `error` never observes a live credential or a held slot for this task.
    async fn run_attempt(&self, attempt: Attempt) {
        let Attempt {
            task_id,
            request,
            credential,
            permit,
        } = attempt;

        self.registry
            .update(&task_id, |task| {
                if task.status.can_transition_to(Status::Downloading) {
                    task.status = Status::Downloading;
                }
            })
            .await;
        tracing::debug!(task_id = %task_id, engine = self.engine.name(), "download attempt started");

        // Events are applied in emission order by a single consumer
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
        let registry = self.registry.clone();
        let consumer_id = task_id.clone();
        let consumer = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                registry.apply_event(&consumer_id, &event).await;
            }
        });

        // Engine runs in its own task so a panic becomes a JoinError instead of
        // unwinding through the bookkeeping below
        let engine = self.engine.clone();
        let engine_request = request.clone();
        let result = tokio::spawn(async move { engine.download(&engine_request, event_tx).await }).await;

        if let Err(e) = consumer.await {
            tracing::error!(task_id = %task_id, error = %e, "progress consumer failed");
        }

        let outcome = match result {
            Ok(Ok(output)) => self.verify(&task_id, &request, output).await,
            Ok(Err(e)) => {
                tracing::warn!(task_id = %task_id, error = %e, "download failed");
                Outcome::Failed(classifier::classify(&e.message))
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "download attempt aborted");
                Outcome::Failed(classifier::classify(&format!(
                    "download attempt aborted: {}",
                    e
                )))
            }
        };

        if let Some(id) = &credential {
            self.vault.dispose(id).await;
        }
        drop(permit);

        let recorded = self
            .registry
            .update(&task_id, |task| match outcome {
                Outcome::Completed { filename, title } => {
                    progress::mark_completed(task, filename, title)
                }
                Outcome::Failed(error) => progress::mark_failed(task, error),
            })
            .await;

        match recorded {
            Some(true) => tracing::info!(task_id = %task_id, "download attempt finished"),
            Some(false) => {
                tracing::debug!(task_id = %task_id, "task already terminal, outcome dropped")
            }
            None => tracing::debug!(task_id = %task_id, "task swept before attempt finished"),
        }
    }

    /// Confirm the artifact exists before reporting success
    async fn verify(&self, task_id: &TaskId, request: &EngineRequest, output: EngineOutput) -> Outcome {
        match artifacts::locate(&request.output_dir, &output, request.format).await {
            Some(path) => {
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let title = if output.title.is_empty() {
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default()
                } else {
                    output.title
                };
                tracing::info!(task_id = %task_id, file = %filename, "artifact verified");
                Outcome::Completed { filename, title }
            }
            None => {
                let expected = output
                    .filepath
                    .as_ref()
                    .map(|p| p.with_extension(request.format.extension()).display().to_string())
                    .unwrap_or_else(|| format!("*{}*.{}", output.id, request.format.extension()));
                tracing::warn!(task_id = %task_id, expected = %expected, "engine finished but artifact is missing");
                Outcome::Failed(classifier::file_missing(&expected))
            }
        }
    }
}
