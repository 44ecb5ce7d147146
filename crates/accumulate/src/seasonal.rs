//! Accumulation windows that straddle a forecast initialization.
//!
//! A seasonal forecast initialized in month `m0` covers leads 1..=L. An
//! n-month total valid at lead `l` uses the forecast for leads
//! `max(1, l - n + 1)..=l` and, when `l < n`, the last `n - l` observed
//! months before `m0`.

use ndarray::{s, Array1, Array2, ArrayView2, ArrayView3, Axis};

use crate::error::AccumulateError;

/// Blend forecast leads with trailing monitoring months into one n-month total.
///
/// * `forecast`: lead × point; row 0 is lead 1.
/// * `monitoring`: month × point, ending with the month before initialization.
/// * `lead`: 1-based lead at which the total is valid.
/// * `window`: accumulation length in months.
///
/// NaN in any contributing month propagates to that point's total.
///
/// # Errors
///
/// Returns [`AccumulateError::ZeroWindow`], [`AccumulateError::LeadOutOfRange`],
/// [`AccumulateError::PointMismatch`], or
/// [`AccumulateError::InsufficientMonths`] when the available months cannot
/// fill the window exactly.
pub fn blend_forecast(
    forecast: ArrayView2<'_, f64>,
    monitoring: ArrayView2<'_, f64>,
    lead: usize,
    window: usize,
) -> Result<Array1<f64>, AccumulateError> {
    if window == 0 {
        return Err(AccumulateError::ZeroWindow);
    }
    let n_leads = forecast.nrows();
    if lead == 0 || lead > n_leads {
        return Err(AccumulateError::LeadOutOfRange { lead, n_leads });
    }
    if forecast.ncols() != monitoring.ncols() {
        return Err(AccumulateError::PointMismatch {
            left: forecast.ncols(),
            right: monitoring.ncols(),
        });
    }

    let first_lead = lead.saturating_sub(window);
    let n_forecast = lead - first_lead;
    let n_monitoring = window - n_forecast;
    if monitoring.nrows() < n_monitoring {
        return Err(AccumulateError::InsufficientMonths {
            window,
            forecast: n_forecast,
            monitoring: monitoring.nrows(),
        });
    }

    let from_forecast = forecast.slice(s![first_lead..lead, ..]).sum_axis(Axis(0));
    let start = monitoring.nrows() - n_monitoring;
    let from_monitoring = monitoring.slice(s![start.., ..]).sum_axis(Axis(0));

    Ok(from_forecast + from_monitoring)
}

/// Apply [`blend_forecast`] to every member of an ensemble.
///
/// `forecast` is member × lead × point; the result is member × point.
#[tracing::instrument(skip_all, fields(n_members = forecast.len_of(Axis(0)), lead = lead, window = window))]
pub fn blend_forecast_ensemble(
    forecast: ArrayView3<'_, f64>,
    monitoring: ArrayView2<'_, f64>,
    lead: usize,
    window: usize,
) -> Result<Array2<f64>, AccumulateError> {
    let (n_members, _, n_points) = forecast.dim();
    let mut out = Array2::zeros((n_members, n_points));
    for (member, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let blended = blend_forecast(
            forecast.index_axis(Axis(0), member),
            monitoring,
            lead,
            window,
        )?;
        row.assign(&blended);
    }
    Ok(out)
}
