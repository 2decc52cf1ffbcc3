//! Output directory provisioning.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::error::ProvisionError;

/// Makes sure the batch's output directory exists.
#[derive(Debug, Clone, Default)]
pub struct DirectoryProvisioner {
    home: Option<PathBuf>,
}

impl DirectoryProvisioner {
    /// Creates a provisioner that expands `~` to the user's home directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provisioner that expands `~` to `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    /// Expands a leading `~` component.
    ///
    /// Only the current user's home is supported; `~name` is kept literally.
    pub fn expand(&self, path: &Path) -> Result<PathBuf, ProvisionError> {
        if path.as_os_str().is_empty() {
            return Err(ProvisionError::EmptyPath);
        }

        let mut components = path.components();
        match components.next() {
            Some(Component::Normal(first)) if first == "~" => {
                let home = self
                    .home
                    .clone()
                    .or_else(dirs::home_dir)
                    .ok_or_else(|| ProvisionError::HomeDirUnavailable {
                        path: path.to_path_buf(),
                    })?;
                Ok(home.join(components.as_path()))
            }
            _ => Ok(path.to_path_buf()),
        }
    }

    /// Creates `path` and any missing ancestors, returning the expanded path.
    ///
    /// Succeeds without changes when the directory already exists.
    pub async fn ensure_exists(&self, path: &Path) -> Result<PathBuf, ProvisionError> {
        let path = self.expand(path)?;

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => return Ok(path),
            Ok(_) => return Err(ProvisionError::NotADirectory { path }),
            Err(_) => {}
        }

        fs::create_dir_all(&path)
            .await
            .map_err(|source| ProvisionError::CreateFailed {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Created output directory");
        Ok(path)
    }
}
