//! Error types for the spidi-spi crate.

use spidi_accumulate::AccumulateError;

/// Error type for all fallible operations in the spidi-spi crate.
///
/// Numerically degenerate grid points are never reported here; they come back
/// as NaN in the fitted parameters or the index.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpiError {
    /// Returned when a sample matrix has no rows.
    #[error("sample matrix has no rows")]
    EmptySamples,

    /// Returned when samples and fitted parameters cover different grids.
    #[error("grid point mismatch: samples have {samples} points, parameters have {params}")]
    PointMismatch {
        /// Grid points in the sample matrix.
        samples: usize,
        /// Grid points in the parameter arrays.
        params: usize,
    },

    /// Returned when the shape, scale and zero-probability arrays differ in length.
    #[error("parameter length mismatch: shape {shape}, scale {scale}, zero_prob {zero_prob}")]
    ParamLengthMismatch {
        /// Length of the shape array.
        shape: usize,
        /// Length of the scale array.
        scale: usize,
        /// Length of the zero-probability array.
        zero_prob: usize,
    },

    /// Returned when per-row metadata does not match the number of rows.
    #[error("length mismatch: {rows} rows, {months} months, {years} years")]
    LengthMismatch {
        /// Rows in the sample matrix.
        rows: usize,
        /// Length of the month slice.
        months: usize,
        /// Length of the year slice.
        years: usize,
    },

    /// Returned when a month value is outside 1..=12.
    #[error("invalid month: {month} (must be 1..=12)")]
    InvalidMonth {
        /// The invalid month value.
        month: u8,
    },

    /// Returned when the monitoring record lacks the month before a forecast
    /// initialization.
    #[error("monitoring record has no month {year}-{month:02}")]
    MissingMonitoringMonth {
        /// Year of the missing month.
        year: i32,
        /// Calendar month that is missing.
        month: u8,
    },

    /// Returned when a hindcast and its list of initialization years differ in length.
    #[error("hindcast holds {hindcast} years but {years} initialization years were given")]
    YearCountMismatch {
        /// Years along the hindcast's first axis.
        hindcast: usize,
        /// Length of the initialization-year slice.
        years: usize,
    },

    /// Returned when per-lead fits do not match the forecast's leads.
    #[error("{fits} lead fits given for a forecast with {leads} leads")]
    LeadCountMismatch {
        /// Number of fits supplied.
        fits: usize,
        /// Number of forecast leads.
        leads: usize,
    },

    /// Returned when a configuration parameter is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Wraps an accumulation failure.
    #[error(transparent)]
    Accumulate(#[from] AccumulateError),
}
