//! Error types for parameter validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while validating raw conversion parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field was not provided.
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A field was provided but its value is not supported.
    #[error("Unsupported value for {field}: {value}")]
    UnsupportedValue { field: String, value: String },
}

impl ValidationError {
    /// Creates a missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an unsupported value error.
    pub fn unsupported(field: impl Into<String>, value: impl ToString) -> Self {
        Self::UnsupportedValue {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::UnsupportedValue { field, .. } => field,
        }
    }
}
