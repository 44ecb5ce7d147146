//! Vectorised maximum-likelihood gamma fit.
//!
//! Each grid point is fitted independently from its strictly positive samples:
//! Thom's approximation seeds the shape, five Newton steps on
//! `ln k - ψ(k) = s` refine it, and the scale follows as `mean / k`.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use spidi_stats::{digamma, trigamma};
use tracing::debug;

/// Number of Newton refinement steps applied to the shape estimate.
pub const NEWTON_ITERATIONS: usize = 5;

/// Shape used for a failed column while the remaining iterations run.
const FALLBACK_SHAPE: f64 = 7.8;

/// Log-dispersion used for a column whose initial estimate failed.
const FALLBACK_LOG_DISPERSION: f64 = 0.06;

/// Per-point gamma maximum-likelihood estimates.
///
/// Failed points carry NaN in both `shape` and `scale`.
#[derive(Debug, Clone)]
pub struct MleFit {
    shape: Array1<f64>,
    scale: Array1<f64>,
    failed: Vec<usize>,
}

impl MleFit {
    /// Fitted shape (k) per grid point.
    pub fn shape(&self) -> &Array1<f64> {
        &self.shape
    }

    /// Fitted scale (theta) per grid point.
    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Grid points whose fit failed, in ascending order.
    pub fn failed(&self) -> &[usize] {
        &self.failed
    }

    pub(crate) fn into_parts(self) -> (Array1<f64>, Array1<f64>) {
        (self.shape, self.scale)
    }
}

/// Fit a gamma distribution to every column of `samples` by maximum likelihood.
///
/// `samples` is a `T x G` matrix (time by grid point). Only strictly positive
/// finite values contribute; zeros and NaN are ignored. A column fails, and
/// ends with NaN shape and scale, when it has no positive samples, when its
/// log-dispersion `s = ln(mean) - mean(ln x)` is zero, or when the initial
/// estimate or any Newton iterate is not positive.
pub fn fit_gamma_mle(samples: ArrayView2<'_, f64>) -> MleFit {
    let n_points = samples.ncols();
    let mut shape = Array1::from_elem(n_points, f64::NAN);
    let mut scale = Array1::from_elem(n_points, f64::NAN);
    let mut failed = Vec::new();

    for (j, column) in samples.axis_iter(Axis(1)).enumerate() {
        match fit_column(column) {
            Some((k, theta)) => {
                shape[j] = k;
                scale[j] = theta;
            }
            None => failed.push(j),
        }
    }

    if !failed.is_empty() {
        debug!(
            n_failed = failed.len(),
            n_points,
            columns = ?failed,
            "gamma MLE failed; shape and scale left undefined"
        );
    }

    MleFit {
        shape,
        scale,
        failed,
    }
}

/// Returns `(shape, scale)` for one column, or `None` when the fit fails.
fn fit_column(column: ArrayView1<'_, f64>) -> Option<(f64, f64)> {
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_ln = 0.0;
    for &x in column.iter().filter(|x| x.is_finite() && **x > 0.0) {
        n += 1;
        sum += x;
        sum_ln += x.ln();
    }
    if n == 0 {
        return None;
    }

    let mean = sum / n as f64;
    let mut s = mean.ln() - sum_ln / n as f64;
    let mut k = thom_estimate(s);

    // A negative s can only come from rounding on near-constant data; it
    // drives k negative and is caught by the same check.
    let mut bad = s == 0.0 || k.is_nan() || k <= 0.0;
    if bad {
        k = FALLBACK_SHAPE;
        s = FALLBACK_LOG_DISPERSION;
    }

    for _ in 0..NEWTON_ITERATIONS {
        k -= (k.ln() - digamma(k) - s) / (1.0 / k - trigamma(k));
        if k.is_nan() || k <= 0.0 {
            bad = true;
        }
        if bad {
            k = FALLBACK_SHAPE;
        }
    }

    if bad {
        None
    } else {
        Some((k, mean / k))
    }
}

/// Thom's closed-form approximation to the gamma shape.
fn thom_estimate(s: f64) -> f64 {
    (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s)
}
