//! Bounded-memory processing of large grids.
//!
//! The grid-point axis is split into contiguous chunks of at most
//! `max_chunk` points. Each chunk is fitted or evaluated independently and
//! the results are assembled in chunk order, so the output is identical to a
//! single pass over the whole grid.

use std::ops::Range;

use ndarray::{s, Array2, ArrayView2};
use tracing::debug;

use crate::config::SpiConfig;
use crate::error::SpiError;
use crate::fit::{fit, SpiFit};
use crate::transform::evaluate;

/// Split `n_points` grid points into contiguous ranges of at most `max_chunk`.
///
/// Uses `ceil(n_points / max_chunk)` chunks with boundaries `i * n_points / n`,
/// so chunk sizes differ by at most one and no chunk is empty. The ranges are
/// disjoint and cover `0..n_points` in order.
///
/// # Errors
///
/// Returns [`SpiError::InvalidConfig`] when `max_chunk` is zero.
///
/// # Example
///
/// ```
/// use spidi_spi::partition;
///
/// let chunks = partition(101, 40).unwrap();
/// assert_eq!(chunks, vec![0..33, 33..67, 67..101]);
/// ```
pub fn partition(n_points: usize, max_chunk: usize) -> Result<Vec<Range<usize>>, SpiError> {
    if max_chunk == 0 {
        return Err(SpiError::InvalidConfig {
            reason: "max_chunk must be >= 1, got 0".to_string(),
        });
    }
    if n_points == 0 {
        return Ok(Vec::new());
    }

    let n_chunks = n_points.div_ceil(max_chunk);
    let bounds: Vec<usize> = (0..=n_chunks).map(|i| i * n_points / n_chunks).collect();
    Ok(bounds.windows(2).map(|w| w[0]..w[1]).collect())
}

/// Run `job` over every chunk, in parallel when the `parallel` feature is on.
///
/// Results come back in chunk order. The first error aborts the whole run.
fn run_chunks<T, F>(chunks: &[Range<usize>], job: F) -> Result<Vec<T>, SpiError>
where
    T: Send,
    F: Fn(&Range<usize>) -> Result<T, SpiError> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        chunks.par_iter().map(job).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        chunks.iter().map(job).collect()
    }
}

/// [`fit`] over a grid processed in chunks of at most `config.max_chunk()` points.
///
/// # Errors
///
/// Same as [`fit`]. Nothing is returned unless every chunk succeeds.
#[tracing::instrument(skip_all, fields(n_samples = samples.nrows(), n_points = samples.ncols()))]
pub fn fit_chunked(samples: ArrayView2<'_, f64>, config: &SpiConfig) -> Result<SpiFit, SpiError> {
    config.validate()?;
    if samples.nrows() == 0 {
        return Err(SpiError::EmptySamples);
    }

    let chunks = partition(samples.ncols(), config.max_chunk())?;
    debug!(n_chunks = chunks.len(), "fitting in chunks");

    let parts = run_chunks(&chunks, |range| {
        fit(samples.slice(s![.., range.clone()]), config)
    })?;

    let mut out = SpiFit::undefined(samples.ncols());
    for (range, part) in chunks.into_iter().zip(parts.iter()) {
        out.assign(range, part);
    }
    Ok(out)
}

/// [`evaluate`] over a grid processed in chunks of at most `config.max_chunk()` points.
///
/// # Errors
///
/// Same as [`evaluate`]. Nothing is returned unless every chunk succeeds.
#[tracing::instrument(skip_all, fields(n_samples = samples.nrows(), n_points = samples.ncols()))]
pub fn evaluate_chunked(
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

    let chunks = partition(samples.ncols(), config.max_chunk())?;
    debug!(n_chunks = chunks.len(), "evaluating in chunks");

    let parts = run_chunks(&chunks, |range| {
        let sub_fit = fit.select(range.clone());
        evaluate(samples.slice(s![.., range.clone()]), &sub_fit, config)
    })?;

    let mut out = Array2::from_elem(samples.raw_dim(), f64::NAN);
    for (range, part) in chunks.into_iter().zip(parts.iter()) {
        out.slice_mut(s![.., range]).assign(part);
    }
    Ok(out)
}
