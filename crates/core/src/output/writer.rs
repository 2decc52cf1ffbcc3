//! Atomic output writes.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use super::error::WriteError;

/// Writes files through a temporary sibling and a rename, so readers never
/// observe a partially written output.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    temp_suffix: String,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new(".part")
    }
}

impl AtomicWriter {
    pub fn new(temp_suffix: impl Into<String>) -> Self {
        Self {
            temp_suffix: temp_suffix.into(),
        }
    }

    /// Temporary path used while writing `destination`.
    pub fn temp_path_for(&self, destination: &Path) -> Option<PathBuf> {
        let parent = destination.parent()?;
        let name = destination.file_name()?;
        Some(parent.join(format!(
            ".{}.{}{}",
            name.to_string_lossy(),
            Uuid::new_v4().simple(),
            self.temp_suffix
        )))
    }

    /// Writes `data` to `destination`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    pub async fn write(&self, destination: &Path, data: &[u8]) -> Result<u64, WriteError> {
        let temp = self
            .temp_path_for(destination)
            .ok_or_else(|| WriteError::InvalidDestination {
                path: destination.to_path_buf(),
            })?;

        if let Err(source) = write_and_sync(&temp, data).await {
            discard(&temp).await;
            return Err(WriteError::WriteFailed {
                path: destination.to_path_buf(),
                source,
            });
        }

        if let Err(source) = fs::rename(&temp, destination).await {
            discard(&temp).await;
            return Err(WriteError::RenameFailed {
                from: temp,
                to: destination.to_path_buf(),
                source,
            });
        }

        Ok(data.len() as u64)
    }
}

async fn write_and_sync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}
