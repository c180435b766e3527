//! # Token File
//!
//! Stages a cluster identity token on disk for the external-account credential
//! source. Each invocation gets its own path; the file is removed when the
//! guard is dropped, including when a reconciliation is cancelled mid-exchange.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::provider::FederationError;

#[derive(Debug)]
pub struct TokenFile {
    path: PathBuf,
    remove_on_drop: bool,
}

impl TokenFile {
    /// Write `token` to `<directory>/<namespace>-<service_account>-<uuid>`,
    /// creating the directory when it does not exist yet.
    pub async fn write(
        directory: &Path,
        namespace: &str,
        service_account: &str,
        token: &str,
        remove_on_drop: bool,
    ) -> Result<Self, FederationError> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| FederationError::TokenFile {
                path: directory.display().to_string(),
                source,
            })?;

        let path = directory.join(format!(
            "{namespace}-{service_account}-{}",
            uuid::Uuid::new_v4()
        ));
        // Guard exists before the write so a partial file is still cleaned up
        let file = Self {
            path,
            remove_on_drop,
        };
        write_owner_only(&file.path, token)
            .await
            .map_err(|source| FederationError::TokenFile {
                path: file.path.display().to_string(),
                source,
            })?;

        debug!(path = %file.path.display(), "Staged cluster token");
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create `path` readable by the controller's user only
async fn write_owner_only(path: &Path, token: &str) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(token.as_bytes()).await?;
    file.flush().await
}

impl Drop for TokenFile {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged cluster token"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staged cluster token"),
        }
    }
}
