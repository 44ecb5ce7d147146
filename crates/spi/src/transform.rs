//! Standardisation of accumulated precipitation through a fitted distribution.

use ndarray::{Array2, ArrayView2, Axis};
use spidi_stats::normal_quantile;
use statrs::distribution::{ContinuousCDF, Gamma};
use tracing::debug;

use crate::config::SpiConfig;
use crate::error::SpiError;
use crate::fit::SpiFit;

/// Map one accumulated value to a standard normal deviate.
///
/// The mixed cumulative probability `q + (1 - q) * F(x)` is clipped to the
/// configured bounds before inversion, so the result is always finite.
fn standardize(x: f64, zero_prob: f64, dist: &Gamma, config: &SpiConfig) -> f64 {
    let p = zero_prob + (1.0 - zero_prob) * dist.cdf(x);
    normal_quantile(p.clamp(config.prob_floor(), config.prob_ceil()))
}

/// Evaluate the SPI for every sample of `samples` under `fit`.
///
/// `samples` is a `T x G` matrix of accumulated precipitation; the output has
/// the same shape. A cell is NaN when its input is NaN or its grid point has
/// no usable fit (zero probability above `zero_max`, or undefined gamma
/// parameters).
///
/// # Errors
///
/// Returns [`SpiError::PointMismatch`] when the column count differs from
/// the number of fitted grid points, and [`SpiError::InvalidConfig`] for an
/// invalid configuration.
#[tracing::instrument(skip_all, fields(n_samples = samples.nrows(), n_points = samples.ncols()))]
pub fn evaluate(
    samples: ArrayView2<'_, f64>,
    fit: &SpiFit,
    config: &SpiConfig,
) -> Result<Array2<f64>, SpiError> {
    config.validate()?;
    if samples.ncols() != fit.n_points() {
        return Err(SpiError::PointMismatch {
            samples: samples.ncols(),
            params: fit.n_points(),
        });
    }

    let mut out = Array2::from_elem(samples.raw_dim(), f64::NAN);
    let mut n_undefined = 0usize;

    for (j, (column, mut out_column)) in samples
        .axis_iter(Axis(1))
        .zip(out.axis_iter_mut(Axis(1)))
        .enumerate()
    {
        let Some((dist, zero_prob)) = fit.distribution_at(j, config.zero_max()) else {
            n_undefined += 1;
            continue;
        };

        for (&x, o) in column.iter().zip(out_column.iter_mut()) {
            if !x.is_nan() {
                *o = standardize(x, zero_prob, &dist, config);
            }
        }
    }

    debug!(n_undefined, "SPI evaluation complete");
    Ok(out)
}
