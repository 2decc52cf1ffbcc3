//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::ErrorKind;

/// Errors that can occur while transcoding one file.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Input is not a readable audio file.
    #[error("Cannot decode {path}: {reason}")]
    DecodeFailed { path: PathBuf, reason: String },

    /// The target codec cannot produce the requested encoding.
    #[error("Unsupported encoding: {reason}")]
    UnsupportedEncoding { reason: String },

    /// Encoder process failed.
    #[error("Encoding failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encoder produced output that does not match the request.
    #[error("Invalid encoder output: {reason}")]
    InvalidOutput { reason: String },

    /// Transcoding timed out.
    #[error("Transcoding timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while reading input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },
}

impl TranscodeError {
    /// Creates a decode failure for `path`.
    pub fn decode_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DecodeFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an encode failure with optional stderr output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates an unsupported encoding error.
    pub fn unsupported_encoding(reason: impl Into<String>) -> Self {
        Self::UnsupportedEncoding {
            reason: reason.into(),
        }
    }

    /// Creates an invalid output error.
    pub fn invalid_output(reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            reason: reason.into(),
        }
    }

    /// Classifies this error for a per-file outcome.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound { .. } | Self::Io(_) => ErrorKind::IoError,
            Self::FfprobeNotFound { .. } | Self::DecodeFailed { .. } | Self::ParseError { .. } => {
                ErrorKind::DecodeError
            }
            Self::FfmpegNotFound { .. }
            | Self::UnsupportedEncoding { .. }
            | Self::EncodeFailed { .. }
            | Self::InvalidOutput { .. }
            | Self::Timeout { .. } => ErrorKind::EncodeError,
        }
    }
}
