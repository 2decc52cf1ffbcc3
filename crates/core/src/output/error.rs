//! Error types for the output module.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::ErrorKind;

/// Errors raised while preparing the output directory.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The path is empty.
    #[error("Output directory path is empty")]
    EmptyPath,

    /// `~` could not be expanded.
    #[error("Cannot expand {path}: home directory unknown")]
    HomeDirUnavailable { path: PathBuf },

    /// Something other than a directory exists at the path.
    #[error("Output path exists and is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Creating the directory (or one of its ancestors) failed.
    #[error("Failed to create directory: {path}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    /// The offending path, when there is one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::EmptyPath => None,
            Self::HomeDirUnavailable { path }
            | Self::NotADirectory { path }
            | Self::CreateFailed { path, .. } => Some(path),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::IoError
    }
}

/// Errors raised while deriving an output path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The input path has no file stem to name the output after.
    #[error("Input has no usable file name: {input}")]
    MissingStem { input: PathBuf },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::IoError
    }
}

/// Errors raised while writing an output file.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Destination has no parent directory.
    #[error("Invalid destination: {path}")]
    InvalidDestination { path: PathBuf },

    /// Writing the temporary file failed.
    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temporary file into place failed.
    #[error("Failed to move {from} to {to}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::IoError
    }
}
