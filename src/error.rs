//! Error types for the pasilla pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Broad failure class of a [`DeseqError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or mismatched input tables
    Schema,
    /// Degenerate data or a statistics routine that cannot proceed
    Fit,
    /// Output destination could not be written
    Export,
    Other,
}

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum DeseqError {
    #[error("Schema error: {reason}")]
    Schema { reason: String },

    #[error("Fit error: {reason}")]
    Fit { reason: String },

    #[error("Export to {} failed: {reason}", path.display())]
    Export { path: PathBuf, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DeseqError {
    pub fn schema(reason: impl Into<String>) -> Self {
        DeseqError::Schema { reason: reason.into() }
    }

    pub fn fit(reason: impl Into<String>) -> Self {
        DeseqError::Fit { reason: reason.into() }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DeseqError::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DeseqError::Schema { .. } | DeseqError::CsvError(_) => ErrorClass::Schema,
            DeseqError::Fit { .. } => ErrorClass::Fit,
            DeseqError::Export { .. } => ErrorClass::Export,
            _ => ErrorClass::Other,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DeseqError>;
