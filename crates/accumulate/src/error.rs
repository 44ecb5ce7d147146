//! Error types for the spidi-accumulate crate.

/// Error type for all fallible operations in the spidi-accumulate crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccumulateError {
    /// Returned when the window length is zero.
    #[error("window length must be at least 1")]
    ZeroWindow,

    /// Returned when the window is longer than the accumulated axis.
    #[error("window of {window} steps exceeds the {available} available along the time axis")]
    WindowTooLong {
        /// Requested window length.
        window: usize,
        /// Number of steps along the time axis.
        available: usize,
    },

    /// Returned when the axis index is not 0 or 1.
    #[error("invalid axis {axis} for a two-dimensional sample matrix")]
    InvalidAxis {
        /// The axis that was requested.
        axis: usize,
    },

    /// Returned when a forecast lead is outside `1..=n_leads`.
    #[error("lead {lead} outside the forecast range 1..={n_leads}")]
    LeadOutOfRange {
        /// Requested 1-based lead.
        lead: usize,
        /// Number of leads available.
        n_leads: usize,
    },

    /// Returned when forecast and monitoring months do not add up to the
    /// accumulation window.
    #[error(
        "accumulation needs {window} months but only {forecast} forecast and {monitoring} monitoring months are available"
    )]
    InsufficientMonths {
        /// Accumulation window in months.
        window: usize,
        /// Forecast months contributing to the window.
        forecast: usize,
        /// Monitoring months available before initialization.
        monitoring: usize,
    },

    /// Returned when two arrays disagree on the number of grid points.
    #[error("grid point mismatch: {left} vs {right}")]
    PointMismatch {
        /// Points in the first array.
        left: usize,
        /// Points in the second array.
        right: usize,
    },
}
