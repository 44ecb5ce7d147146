//! Precipitation accumulation over gridded time series.
//!
//! Multi-month precipitation totals feed the SPI fit and transform. Inputs are
//! sample matrices with time along one axis and grid points along the other.
//!
//! # Quick Start
//!
//! ```
//! use ndarray::{array, Axis};
//! use spidi_accumulate::{rolling_sum, zero_floor};
//!
//! // Monthly precipitation, rows = months, columns = grid points.
//! let mut monthly = array![[0.01, 3.0], [2.0, 4.0], [1.0, 5.0]];
//! zero_floor(monthly.view_mut(), 0.03);
//!
//! let seasonal = rolling_sum(monthly.view(), 3, Axis(0)).unwrap();
//! assert!(seasonal[[0, 0]].is_nan());
//! assert_eq!(seasonal[[2, 1]], 12.0);
//! ```

mod error;
mod rolling;
mod seasonal;

pub use error::AccumulateError;
pub use rolling::{rolling_sum, zero_floor};
pub use seasonal::{blend_forecast, blend_forecast_ensemble};
