//! エラー型定義 (rsv-core)

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure on a recurrence request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending field, as it appears on the wire (camelCase)
    pub field: String,
    /// Human readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Main error type for rsv-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Series not found: {0}")]
    SeriesNotFound(i64),

    #[error("Series {0} is exhausted and cannot be reactivated")]
    SeriesExhausted(i64),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Field errors carried by a validation failure, empty otherwise
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(fields) => fields,
            _ => &[],
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
