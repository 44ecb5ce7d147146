//! Error types for spidi-io.

use std::path::PathBuf;

/// Error type for all fallible operations in the spidi-io crate.
///
/// Covers missing files, format failures from Arrow, Parquet and the JSON
/// metadata encoding, malformed field files, and inconsistent parameter sets.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a required file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that could not be found.
        path: PathBuf,
    },

    /// Wraps an operating-system I/O failure.
    #[error("i/o error: {reason}")]
    Io {
        /// Description of the underlying failure.
        reason: String,
    },

    /// Wraps an error originating from the Parquet library.
    #[error("parquet error: {reason}")]
    Parquet {
        /// Description of the underlying Parquet failure.
        reason: String,
    },

    /// Wraps an error originating from the Arrow library.
    #[error("arrow error: {reason}")]
    Arrow {
        /// Description of the underlying Arrow failure.
        reason: String,
    },

    /// Returned when field metadata cannot be encoded or decoded.
    #[error("metadata error: {reason}")]
    Metadata {
        /// Description of the encoding failure.
        reason: String,
    },

    /// Returned when a field lacks a metadata key that the caller requires.
    #[error("metadata key '{key}' missing from field")]
    MissingKey {
        /// Name of the missing key.
        key: String,
    },

    /// Returned when a field file does not have the expected columns.
    #[error("unexpected field file schema: {details}")]
    Schema {
        /// Description of the mismatch.
        details: String,
    },

    /// Returned when stored parameter files disagree with each other.
    #[error("inconsistent parameter files: {details}")]
    ParamMismatch {
        /// Description of the inconsistency.
        details: String,
    },

    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io {
            reason: e.to_string(),
        }
    }
}

impl From<parquet::errors::ParquetError> for IoError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        IoError::Parquet {
            reason: e.to_string(),
        }
    }
}

impl From<arrow::error::ArrowError> for IoError {
    fn from(e: arrow::error::ArrowError) -> Self {
        IoError::Arrow {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Metadata {
            reason: e.to_string(),
        }
    }
}
