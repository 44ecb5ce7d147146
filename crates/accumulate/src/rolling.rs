//! Trailing-window sums along the time axis of a sample matrix.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut, ArrayViewMut1, Axis, Dimension};

use tracing::debug;

use crate::error::AccumulateError;

/// Trailing-window sum along `axis` of a two-dimensional sample matrix.
///
/// Output position `t` along the time axis holds the sum of input steps
/// `t + 1 - window ..= t`. The first `window - 1` steps of every lane have no
/// complete window and are NaN. A window containing a non-finite input is
/// NaN; all other windows are unaffected by it.
///
/// Each lane is accumulated through prefix sums of its finite values and a
/// prefix count of non-finite ones, so the cost is linear in the matrix size
/// regardless of the window length.
///
/// # Errors
///
/// Returns [`AccumulateError::InvalidAxis`] for an axis other than 0 or 1,
/// [`AccumulateError::ZeroWindow`] for `window == 0`, and
/// [`AccumulateError::WindowTooLong`] if the time axis is shorter than the
/// window.
#[tracing::instrument(skip_all, fields(window = window, axis = axis.index()))]
pub fn rolling_sum(
    data: ArrayView2<'_, f64>,
    window: usize,
    axis: Axis,
) -> Result<Array2<f64>, AccumulateError> {
    if axis.index() > 1 {
        return Err(AccumulateError::InvalidAxis { axis: axis.index() });
    }
    if window == 0 {
        return Err(AccumulateError::ZeroWindow);
    }
    let available = data.len_of(axis);
    if window > available {
        return Err(AccumulateError::WindowTooLong { window, available });
    }

    let mut out = Array2::from_elem(data.raw_dim(), f64::NAN);
    for (lane, out_lane) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        accumulate_lane(lane, out_lane, window);
    }
    debug!(n_lanes = data.len_of(Axis(1 - axis.index())), "rolling sum complete");
    Ok(out)
}

fn accumulate_lane(lane: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>, window: usize) {
    let n = lane.len();
    let mut sums = Vec::with_capacity(n + 1);
    let mut gaps = Vec::with_capacity(n + 1);
    sums.push(0.0);
    gaps.push(0usize);

    let (mut sum, mut gap) = (0.0, 0usize);
    for &x in lane.iter() {
        if x.is_finite() {
            sum += x;
        } else {
            gap += 1;
        }
        sums.push(sum);
        gaps.push(gap);
    }

    for t in (window - 1)..n {
        let lo = t + 1 - window;
        out[t] = if gaps[t + 1] > gaps[lo] {
            f64::NAN
        } else {
            sums[t + 1] - sums[lo]
        };
    }
}

/// Set every value below `threshold` to exactly zero.
///
/// Precipitation under the minimum rate is treated as dry before
/// accumulation. NaN is left untouched.
pub fn zero_floor<D: Dimension>(mut data: ArrayViewMut<'_, f64, D>, threshold: f64) {
    data.mapv_inplace(|x| if x < threshold { 0.0 } else { x });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn window_three_rows() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let out = rolling_sum(data.view(), 3, Axis(0)).unwrap();
        assert!(out[[0, 0]].is_nan() && out[[1, 0]].is_nan());
        assert!(out[[0, 1]].is_nan() && out[[1, 1]].is_nan());
        assert_relative_eq!(out[[2, 0]], 6.0);
        assert_relative_eq!(out[[3, 0]], 9.0);
        assert_relative_eq!(out[[2, 1]], 60.0);
        assert_relative_eq!(out[[3, 1]], 90.0);
    }

    #[test]
    fn window_along_columns() {
        let data = array![[1.0, 2.0, 3.0, 4.0]];
        let out = rolling_sum(data.view(), 2, Axis(1)).unwrap();
        assert!(out[[0, 0]].is_nan());
        assert_relative_eq!(out[[0, 1]], 3.0);
        assert_relative_eq!(out[[0, 2]], 5.0);
        assert_relative_eq!(out[[0, 3]], 7.0);
    }

    #[test]
    fn window_of_one_is_identity() {
        let data = array![[0.5, 1.5], [2.5, 3.5]];
        let out = rolling_sum(data.view(), 1, Axis(0)).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn full_length_window() {
        let data = array![[1.0], [2.0], [3.0]];
        let out = rolling_sum(data.view(), 3, Axis(0)).unwrap();
        assert!(out[[0, 0]].is_nan() && out[[1, 0]].is_nan());
        assert_relative_eq!(out[[2, 0]], 6.0);
    }

    #[test]
    fn nan_only_poisons_its_windows() {
        let data = array![[1.0], [f64::NAN], [3.0], [4.0], [5.0]];
        let out = rolling_sum(data.view(), 2, Axis(0)).unwrap();
        assert!(out[[1, 0]].is_nan());
        assert!(out[[2, 0]].is_nan());
        assert_relative_eq!(out[[3, 0]], 7.0);
        assert_relative_eq!(out[[4, 0]], 9.0);
    }

    #[test]
    fn rejects_zero_window() {
        let data = array![[1.0]];
        assert!(matches!(
            rolling_sum(data.view(), 0, Axis(0)),
            Err(AccumulateError::ZeroWindow)
        ));
    }

    #[test]
    fn rejects_window_longer_than_series() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            rolling_sum(data.view(), 3, Axis(0)),
            Err(AccumulateError::WindowTooLong {
                window: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn rejects_third_axis() {
        let data = array![[1.0]];
        assert!(matches!(
            rolling_sum(data.view(), 1, Axis(2)),
            Err(AccumulateError::InvalidAxis { axis: 2 })
        ));
    }

    #[test]
    fn zero_floor_threshold() {
        let mut data = array![[0.01, 0.03], [f64::NAN, 2.0]];
        zero_floor(data.view_mut(), 0.03);
        assert_eq!(data[[0, 0]], 0.0);
        assert_eq!(data[[0, 1]], 0.03);
        assert!(data[[1, 0]].is_nan());
        assert_eq!(data[[1, 1]], 2.0);
    }
}
