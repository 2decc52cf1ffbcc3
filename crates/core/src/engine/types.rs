//! Types for the engine module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::params::{ConversionParameters, RawParameters, ValidationError};

/// Classification of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input could not be read as audio.
    DecodeError,
    /// Target could not be produced from the decoded audio.
    EncodeError,
    /// Filesystem problem reading the input or writing the output.
    IoError,
    /// The batch was cancelled before this file started.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecodeError => "decode_error",
            Self::EncodeError => "encode_error",
            Self::IoError => "io_error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// The output file was written.
    Success {
        input_path: PathBuf,
        output_path: PathBuf,
        bytes_written: u64,
        duration_ms: u64,
    },
    /// The input could not be converted. Nothing was written for it.
    Failure {
        input_path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_path: Option<PathBuf>,
        error_kind: ErrorKind,
        message: String,
    },
}

impl ConversionOutcome {
    /// Creates a failure outcome.
    pub fn failure(
        input_path: impl Into<PathBuf>,
        output_path: Option<PathBuf>,
        error_kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Failure {
            input_path: input_path.into(),
            output_path,
            error_kind,
            message: message.into(),
        }
    }

    /// Creates the outcome of an input that was never started.
    pub fn cancelled(input_path: impl Into<PathBuf>, output_path: Option<PathBuf>) -> Self {
        Self::failure(input_path, output_path, ErrorKind::Cancelled, "batch cancelled")
    }

    pub fn input_path(&self) -> &Path {
        match self {
            Self::Success { input_path, .. } | Self::Failure { input_path, .. } => input_path,
        }
    }

    /// Target path, when it could be derived.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output_path, .. } => Some(output_path),
            Self::Failure { output_path, .. } => output_path.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure classification, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

/// Error that stopped a batch before any file was processed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchError {
    /// Parameters failed validation.
    #[error("Invalid parameters: {error}")]
    Validation { error: ValidationError },

    /// Output directory could not be prepared.
    #[error("Cannot prepare output directory {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl From<ValidationError> for BatchError {
    fn from(error: ValidationError) -> Self {
        Self::Validation { error }
    }
}

/// One batch: inputs, raw parameters and where to put the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Input files, in the order outcomes are reported.
    pub inputs: Vec<PathBuf>,
    /// Unvalidated parameters as the shell collected them.
    pub params: RawParameters,
    /// Output directory; a leading `~` is expanded.
    pub output_dir: PathBuf,
}

impl BatchRequest {
    pub fn new(
        inputs: impl IntoIterator<Item = impl Into<PathBuf>>,
        params: RawParameters,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            params,
            output_dir: output_dir.into(),
        }
    }

    /// Same request restricted to `inputs`, e.g. the failed subset of a report.
    pub fn with_inputs(&self, inputs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }
}

/// Result of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Output directory, expanded once provisioning got that far.
    pub output_dir: PathBuf,
    /// Validated parameters, absent when validation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ConversionParameters>,
    /// One outcome per input, in input order. Empty when the batch aborted.
    pub outcomes: Vec<ConversionOutcome>,
    /// Set only when the batch aborted before processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
    /// Output paths targeted by more than one input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Number of successful outcomes.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed outcomes, cancellations included.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Inputs whose outcome is a failure, in input order.
    pub fn failed_inputs(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(ConversionOutcome::input_path)
            .collect()
    }

    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    /// True when the batch ran and every file succeeded.
    pub fn is_success(&self) -> bool {
        !self.is_aborted() && self.failed() == 0
    }

    /// Wall-clock duration of the batch.
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Progress notifications streamed while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Processing is about to start.
    Started {
        batch_id: Uuid,
        total: usize,
        output_dir: PathBuf,
    },
    /// One input finished.
    Outcome {
        index: usize,
        total: usize,
        outcome: ConversionOutcome,
    },
    /// The batch is over; always the last event.
    Finished {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<BatchError>,
    },
}

/// Planned output of one input, from a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOutput {
    pub input_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Why no output path could be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a batch would do, without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub output_dir: PathBuf,
    pub parameters: ConversionParameters,
    pub outputs: Vec<PlannedOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<PathBuf>,
}

/// Where the engine is in its current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Validating,
    Provisioning,
    Processing { completed: usize, total: usize },
    Done,
}

/// Counters over the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub active_jobs: usize,
    pub max_parallel_jobs: usize,
    pub total_batches: u64,
    pub total_converted: u64,
    pub total_failed: u64,
}
