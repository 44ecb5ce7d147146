//! Zero-inflated gamma fitting.

use std::ops::Range;

use ndarray::{s, Array1, ArrayView1, ArrayView2, Axis};
use statrs::distribution::Gamma;
use tracing::debug;

use crate::config::SpiConfig;
use crate::error::SpiError;
use crate::mle::fit_gamma_mle;

/// Fitted zero-inflated gamma parameters, one entry per grid point.
///
/// A grid point is usable when its zero probability does not exceed the
/// configured `zero_max` and both gamma parameters are defined. Everything
/// else is carried as NaN and yields an undefined index.
#[derive(Debug, Clone)]
pub struct SpiFit {
    shape: Array1<f64>,
    scale: Array1<f64>,
    zero_prob: Array1<f64>,
}

impl SpiFit {
    /// Builds a fit from per-point parameter arrays of equal length.
    pub fn new(
        shape: Array1<f64>,
        scale: Array1<f64>,
        zero_prob: Array1<f64>,
    ) -> Result<Self, SpiError> {
        if shape.len() != scale.len() || shape.len() != zero_prob.len() {
            return Err(SpiError::ParamLengthMismatch {
                shape: shape.len(),
                scale: scale.len(),
                zero_prob: zero_prob.len(),
            });
        }
        Ok(Self {
            shape,
            scale,
            zero_prob,
        })
    }

    /// A fit for `n_points` grid points with every parameter undefined.
    pub fn undefined(n_points: usize) -> Self {
        Self {
            shape: Array1::from_elem(n_points, f64::NAN),
            scale: Array1::from_elem(n_points, f64::NAN),
            zero_prob: Array1::from_elem(n_points, f64::NAN),
        }
    }

    /// Number of grid points covered.
    pub fn n_points(&self) -> usize {
        self.shape.len()
    }

    /// Gamma shape (k) per grid point.
    pub fn shape(&self) -> ArrayView1<'_, f64> {
        self.shape.view()
    }

    /// Gamma scale (theta) per grid point.
    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }

    /// Probability of zero precipitation per grid point.
    pub fn zero_prob(&self) -> ArrayView1<'_, f64> {
        self.zero_prob.view()
    }

    /// Returns the gamma distribution and zero probability for `point` when
    /// the point is usable under `zero_max`.
    ///
    /// statrs parameterises the gamma by rate, so the stored scale is inverted.
    pub fn distribution_at(&self, point: usize, zero_max: f64) -> Option<(Gamma, f64)> {
        let q = self.zero_prob[point];
        if q.is_nan() || q > zero_max {
            return None;
        }
        let (k, theta) = (self.shape[point], self.scale[point]);
        if !(k.is_finite() && k > 0.0 && theta.is_finite() && theta > 0.0) {
            return None;
        }
        Gamma::new(k, 1.0 / theta).ok().map(|dist| (dist, q))
    }

    /// Number of usable grid points under `zero_max`.
    pub fn n_valid(&self, zero_max: f64) -> usize {
        (0..self.n_points())
            .filter(|&j| self.distribution_at(j, zero_max).is_some())
            .count()
    }

    /// Copies `other` into the grid points covered by `range`.
    pub(crate) fn assign(&mut self, range: Range<usize>, other: &SpiFit) {
        self.shape.slice_mut(s![range.clone()]).assign(&other.shape);
        self.scale.slice_mut(s![range.clone()]).assign(&other.scale);
        self.zero_prob.slice_mut(s![range]).assign(&other.zero_prob);
    }

    /// Returns the sub-fit for the grid points in `range`.
    pub(crate) fn select(&self, range: Range<usize>) -> SpiFit {
        SpiFit {
            shape: self.shape.slice(s![range.clone()]).to_owned(),
            scale: self.scale.slice(s![range.clone()]).to_owned(),
            zero_prob: self.zero_prob.slice(s![range]).to_owned(),
        }
    }
}

/// Fraction of non-positive samples per grid point, over defined samples only.
///
/// Points with no defined samples get NaN.
pub(crate) fn zero_fraction(samples: ArrayView2<'_, f64>) -> Array1<f64> {
    samples
        .axis_iter(Axis(1))
        .map(|column| {
            let mut defined = 0usize;
            let mut zeros = 0usize;
            for &x in column.iter().filter(|x| !x.is_nan()) {
                defined += 1;
                if x <= 0.0 {
                    zeros += 1;
                }
            }
            if defined == 0 {
                f64::NAN
            } else {
                zeros as f64 / defined as f64
            }
        })
        .collect()
}

/// Fit a zero-inflated gamma distribution to every grid point of `samples`.
///
/// `samples` is a `T x G` matrix of accumulated precipitation (time by grid
/// point). The zero probability `q` is computed for every point; the gamma
/// fit runs only on points with `q <= zero_max`, and any fitted shape above
/// `max_shape` is discarded as degenerate. Points that are skipped or fail
/// keep NaN shape and scale.
///
/// # Errors
///
/// Returns [`SpiError::InvalidConfig`] for an invalid configuration and
/// [`SpiError::EmptySamples`] when `samples` has no rows.
#[tracing::instrument(skip_all, fields(n_samples = samples.nrows(), n_points = samples.ncols()))]
pub fn fit(samples: ArrayView2<'_, f64>, config: &SpiConfig) -> Result<SpiFit, SpiError> {
    config.validate()?;
    if samples.nrows() == 0 {
        return Err(SpiError::EmptySamples);
    }

    let n_points = samples.ncols();
    let zero_prob = zero_fraction(samples);
    let eligible: Vec<usize> = (0..n_points)
        .filter(|&j| zero_prob[j] <= config.zero_max())
        .collect();

    let mut shape = Array1::from_elem(n_points, f64::NAN);
    let mut scale = Array1::from_elem(n_points, f64::NAN);
    let mut n_degenerate = 0usize;

    if !eligible.is_empty() {
        let subset = samples.select(Axis(1), &eligible);
        let (sub_shape, sub_scale) = fit_gamma_mle(subset.view()).into_parts();
        for (i, &j) in eligible.iter().enumerate() {
            if sub_shape[i] > config.max_shape() {
                n_degenerate += 1;
                continue;
            }
            shape[j] = sub_shape[i];
            scale[j] = sub_scale[i];
        }
    }

    debug!(
        n_eligible = eligible.len(),
        n_degenerate,
        "zero-inflated gamma fit complete"
    );

    SpiFit::new(shape, scale, zero_prob)
}
