//! Credential vault for short-lived cookie files
//!
//! Uploaded cookie files are stored as `<cookie_dir>/<handle>.txt` and handed
//! to the engine by path. A credential is consumed by at most one download
//! attempt: the attempt [claims](CredentialVault::claim) it on submission and
//! disposes it as soon as the attempt ends. A claimed handle is out of reach
//! of other submissions and of deletion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::CredentialId;

const CREDENTIAL_EXTENSION: &str = "txt";

/// Filesystem-backed store of credential files keyed by handle
#[derive(Clone, Debug)]
pub struct CredentialVault {
    dir: PathBuf,
    /// Handles owned by a running attempt
    claimed: Arc<Mutex<HashSet<CredentialId>>>,
}

impl CredentialVault {
    /// Open the vault, creating its directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to create cookie directory '{}': {}", dir.display(), e),
            ))
        })?;
        Ok(Self {
            dir,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Directory the vault stores files in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &CredentialId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, CREDENTIAL_EXTENSION))
    }

    /// Persist credential content under a fresh handle
    ///
    /// Fails with [`Error::InvalidInput`] if the content is not UTF-8 text or
    /// is empty after trimming whitespace.
    pub async fn store(&self, content: &[u8]) -> Result<CredentialId> {
        let text = std::str::from_utf8(content).map_err(|_| {
            Error::InvalidInput("cookie file must be UTF-8 text".into())
        })?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cookie file is empty".into()));
        }

        let id = CredentialId::generate();
        let path = self.path_for(&id);
        fs::write(&path, text).await?;
        restrict_permissions(&path).await;

        info!(cookie_id = %id, bytes = content.len(), "stored credential");
        Ok(id)
    }

    /// Location of the credential file, or `None` if it does not exist
    pub async fn resolve(&self, id: &CredentialId) -> Option<PathBuf> {
        let path = self.path_for(id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Take exclusive use of a credential for one download attempt
    ///
    /// Returns the file location, or `None` if the credential does not exist
    /// or another attempt already holds it. A claim ends with
    /// [`dispose`](Self::dispose) (consumed) or [`release`](Self::release)
    /// (handed back unused).
    pub async fn claim(&self, id: &CredentialId) -> Option<PathBuf> {
        let mut claimed = self.claimed.lock().await;
        if claimed.contains(id) {
            debug!(cookie_id = %id, "credential already claimed");
            return None;
        }
        let path = self.resolve(id).await?;
        claimed.insert(id.clone());
        Some(path)
    }

    /// End a claim without consuming the credential
    pub async fn release(&self, id: &CredentialId) {
        self.claimed.lock().await.remove(id);
    }

    /// Whether a running attempt holds the credential
    pub async fn is_claimed(&self, id: &CredentialId) -> bool {
        self.claimed.lock().await.contains(id)
    }

    /// Delete a credential file and end any claim on it
    ///
    /// Idempotent: a missing file is not an error. Other failures are logged
    /// and swallowed.
    pub async fn dispose(&self, id: &CredentialId) {
        let path = self.path_for(id);
        let mut claimed = self.claimed.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => debug!(cookie_id = %id, "disposed credential"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(cookie_id = %id, "credential already disposed");
            }
            Err(e) => {
                warn!(cookie_id = %id, ?path, error = %e, "failed to dispose credential");
            }
        }
        claimed.remove(id);
    }

    /// Delete a credential at the caller's request
    ///
    /// Unlike [`dispose`](Self::dispose), a missing credential is reported as
    /// [`Error::NotFound`]. A claimed credential already belongs to a download
    /// and is reported the same way.
    pub async fn remove(&self, id: &CredentialId) -> Result<()> {
        let path = self.path_for(id);
        let claimed = self.claimed.lock().await;
        if claimed.contains(id) {
            return Err(Error::NotFound(format!("cookie {} (in use by a download)", id)));
        }
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(cookie_id = %id, "deleted credential");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("cookie {}", id)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Delete credential files last modified more than `max_age` before `now`
    ///
    /// Returns the number of files deleted. Claimed credentials are skipped.
    /// Files that cannot be inspected or deleted are logged and skipped.
    pub async fn sweep_expired(&self, max_age: Duration, now: SystemTime) -> usize {
        let claimed = self.claimed.lock().await;
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?self.dir, error = %e, "failed to read cookie directory");
                return 0;
            }
        };

        let mut deleted = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = ?self.dir, error = %e, "failed to read cookie directory entry");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CREDENTIAL_EXTENSION) {
                continue;
            }
            let in_use = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(CredentialId::parse)
                .is_some_and(|id| claimed.contains(&id));
            if in_use {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(?path, error = %e, "failed to read credential metadata");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(?path, age_secs = age.as_secs(), "deleted expired credential");
                    deleted += 1;
                }
                Err(e) => warn!(?path, error = %e, "failed to delete expired credential"),
            }
        }
        deleted
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await {
        warn!(?path, error = %e, "failed to restrict credential file permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) {}
