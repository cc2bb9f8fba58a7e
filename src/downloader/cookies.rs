//! Credential (cookie file) upload and deletion.

use crate::error::{Error, Result};
use crate::types::{CredentialId, CredentialUpload};

use super::MediaDownloader;

impl MediaDownloader {
    /// Store an uploaded cookie file and return its handle
    ///
    /// The file is consumed by the next download that names the handle and
    /// deleted when that download ends. Unused files are deleted by the
    /// retention sweeper.
    pub async fn upload_credential(&self, content: &[u8]) -> Result<CredentialUpload> {
        let cookie_id = self.vault.store(content).await?;
        Ok(CredentialUpload {
            cookie_id,
            message: "Cookie uploaded. It is deleted automatically after one download.".into(),
        })
    }

    /// Delete an uploaded cookie file before it is used
    ///
    /// Fails with `NotFound` if the handle is unknown or was already consumed.
    pub async fn delete_credential(&self, cookie_id: &str) -> Result<()> {
        let id = CredentialId::parse(cookie_id)
            .ok_or_else(|| Error::NotFound(format!("cookie {}", cookie_id)))?;
        self.vault.remove(&id).await
    }
}
