//! Standardized Precipitation Index over gridded precipitation.
//!
//! The SPI expresses accumulated precipitation as a standard normal deviate:
//! negative values are drier than usual, positive values wetter. Each grid
//! point gets its own zero-inflated gamma distribution, fitted by maximum
//! likelihood to the positive samples with a separate probability of zero.
//!
//! # Pipeline
//!
//! 1. **Fit**: zero fraction `q` per point, then gamma MLE (Thom seed and
//!    Newton refinement) on points with `q <= zero_max`
//! 2. **Evaluate**: `p = q + (1 - q) * F(x)`, clip to
//!    `[prob_floor, prob_ceil]`, invert the standard normal CDF
//! 3. **Chunk**: both steps can run over contiguous groups of at most
//!    `max_chunk` grid points with identical results
//!
//! Two drivers build on these steps: [`monthly_spi`] fits one distribution
//! per calendar month of a monitoring record, and [`fit_forecast`] /
//! [`forecast_spi`] fit one per lead of a seasonal hindcast and standardise
//! new forecasts with it.
//!
//! Degenerate or insufficient data never aborts a run; such points come back
//! as NaN.
//!
//! # Glossary
//!
//! - **MLE**: maximum-likelihood estimation
//! - **Thom estimate**: closed-form approximation to the gamma shape used as
//!   the Newton starting point
//! - **zero_max**: largest zero fraction at which a point is still fitted
//!
//! # Quick Start
//!
//! ```
//! use ndarray::Array2;
//! use spidi_spi::{evaluate, fit, SpiConfig};
//!
//! // 40 time steps at 2 grid points.
//! let samples = Array2::from_shape_fn((40, 2), |(t, g)| 1.0 + ((t * 7 + g * 3) % 11) as f64);
//! let config = SpiConfig::new();
//!
//! let params = fit(samples.view(), &config).unwrap();
//! let spi = evaluate(samples.view(), &params, &config).unwrap();
//! assert_eq!(spi.dim(), (40, 2));
//! assert!(spi.iter().all(|v| v.is_finite()));
//! ```

mod config;
mod error;
mod fit;
mod forecast;
mod mle;
mod monthly;
mod partition;
mod transform;

pub use config::SpiConfig;
pub use error::SpiError;
pub use fit::{fit, SpiFit};
pub use forecast::{fit_forecast, forecast_spi, MonitoringRecord};
pub use mle::{fit_gamma_mle, MleFit, NEWTON_ITERATIONS};
pub use monthly::{monthly_spi, MonthlySpi};
pub use partition::{evaluate_chunked, fit_chunked, partition};
pub use transform::evaluate;
