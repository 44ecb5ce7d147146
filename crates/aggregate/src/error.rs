//! Error types for the spidi-aggregate crate.

use spidi_io::IoError;

/// Error type for all fallible operations in the spidi-aggregate crate.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Returned when a configuration parameter is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a field's grid size differs from earlier fields.
    #[error("field has {got} grid points, expected {expected}")]
    FieldLength {
        /// Grid size established by the first field.
        expected: usize,
        /// Grid size of the offending field.
        got: usize,
    },

    /// Returned when two fields that are combined cover different grids.
    #[error("grid mismatch: {left} points vs {right} points")]
    GridMismatch {
        /// Points in the first operand.
        left: usize,
        /// Points in the second operand.
        right: usize,
    },

    /// Returned when a month value is outside 1..=12.
    #[error("invalid month: {month} (must be 1..=12)")]
    InvalidMonth {
        /// The invalid month value.
        month: i64,
    },

    /// Returned when a forecast lead is below 1.
    #[error("invalid lead: {lead} (leads start at 1)")]
    InvalidLead {
        /// The invalid lead value.
        lead: i64,
    },

    /// Returned when no climatology field exists for a required key value.
    #[error("no climatology field with {key} = {value}")]
    MissingClimatology {
        /// Metadata key that was searched.
        key: String,
        /// Value that had no match.
        value: i64,
    },

    /// Wraps a field-store failure, including missing metadata keys.
    #[error(transparent)]
    Io(#[from] IoError),
}
