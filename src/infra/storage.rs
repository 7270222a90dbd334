//! Local-filesystem blob storage for uploaded attachments.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::domain::{AppError, FileStore};

/// Stores attachment files under a single upload directory. Stored names
/// are generated by the application layer and already sanitized, so the
/// path join here never escapes the root.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Upload directory from `UPLOAD_DIR`, defaulting to `./uploads`.
    pub fn from_env() -> Self {
        let root = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        Self::new(root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn save(&self, stored_name: &str, bytes: &[u8]) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Internal(format!("failed to create upload dir: {e}")))?;
        let path = self.path_for(stored_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write upload: {e}")))?;
        debug!(path = %path.display(), "file stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, stored_name: &str) -> Result<(), AppError> {
        let path = self.path_for(stored_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "file removed");
                Ok(())
            }
            // Already gone is fine; the row is the source of truth.
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Internal(format!("failed to remove upload: {err}"))),
        }
    }
}
