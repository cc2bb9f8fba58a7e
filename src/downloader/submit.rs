//! Submission: validation, admission, liveness pre-check and task creation.

use std::sync::atomic::Ordering;

use chrono::Utc;

use crate::engine::{EngineRequest, ProbeRequest};
use crate::error::{Error, Result};
use crate::types::{CredentialId, DownloadRequest, OutputFormat, Task, TaskId, TaskInfo};

use super::MediaDownloader;
use super::attempt::Attempt;
use super::validation;

impl MediaDownloader {
    /// Submit a download and return its task immediately
    ///
    /// In order:
    /// 1. Rejects the request if shutdown is in progress
    /// 2. Validates format, URL and credential handle (`InvalidInput`, no slot consumed)
    /// 3. Takes an admission slot or fails with `Overloaded` (nothing is queued)
    /// 4. Claims the credential, if any, so no other attempt can use it
    /// 5. Probes the target; live or upcoming broadcasts fail with
    ///    `NotAvailableYet` and the slot is released. Any other probe failure
    ///    is logged and the submission proceeds
    /// 6. Registers the task in `pending` and starts the attempt in the background
    ///
    /// Failures after this returns are recorded on the task and seen by polling.
    pub async fn submit(&self, request: DownloadRequest) -> Result<TaskInfo> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let format: OutputFormat = request.format.parse()?;
        let url = validation::validate_url(&request.url, &self.config.download.allowed_hosts)?;
        let credential = request
            .cookie_id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                CredentialId::parse(raw)
                    .ok_or_else(|| Error::InvalidInput(format!("invalid cookie id '{}'", raw)))
            })
            .transpose()?;

        let permit = self.gate.try_acquire().ok_or_else(|| {
            tracing::info!(
                url = %url,
                active = self.gate.active(),
                max = self.gate.max(),
                "download rejected: all slots busy"
            );
            Error::Overloaded {
                active: self.gate.active(),
                max: self.gate.max(),
            }
        })?;

        // Claimed for this attempt alone; a handle that is missing or held by
        // another attempt downloads without credentials
        let claimed = match credential {
            Some(id) => match self.vault.claim(&id).await {
                Some(path) => Some((id, path)),
                None => {
                    tracing::warn!(cookie_id = %id, "cookie not found or already in use, downloading without credentials");
                    None
                }
            },
            None => None,
        };
        let (credential, credential_path) = claimed.unzip();

        let probe = ProbeRequest {
            url: url.clone(),
            credential: credential_path.clone(),
        };
        match self.engine.probe(&probe).await {
            Ok(info) => {
                if let Some(state) = info.live_state() {
                    if let Some(id) = &credential {
                        self.vault.release(id).await;
                    }
                    drop(permit);
                    let title = info.title.unwrap_or_else(|| url.clone());
                    tracing::info!(url = %url, title = %title, live = state.describe(), "download rejected: target not available yet");
                    return Err(Error::NotAvailableYet {
                        title,
                        live_status: state.describe().to_string(),
                    });
                }
            }
            Err(e) => {
                // The download attempt surfaces the authoritative failure
                tracing::warn!(url = %url, error = %e, "liveness check failed, proceeding");
            }
        }

        let task_id = TaskId::generate();
        let task = Task::new(task_id.clone(), url.clone(), format, Utc::now());
        let info = task.info();
        self.registry.insert(task).await;

        tracing::info!(
            task_id = %task_id,
            url = %url,
            format = %format,
            with_cookie = credential_path.is_some(),
            active = self.gate.active(),
            "download accepted"
        );

        self.spawn_attempt(Attempt {
            task_id,
            request: EngineRequest {
                url,
                format,
                output_dir: self.config.download.download_dir.clone(),
                credential: credential_path,
            },
            credential,
            permit,
        });

        Ok(info)
    }
}
