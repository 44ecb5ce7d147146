//! SPI of seasonal forecast ensembles.
//!
//! A forecast initialised in month `m0` of year `y` is accumulated per lead
//! by blending its leads with the monitoring months before `m0` (see
//! [`spidi_accumulate::blend_forecast`]). The hindcast years for the same
//! initialization month pool their members into one sample per lead, so
//! every lead gets its own zero-inflated gamma fit. A new forecast is then
//! standardised lead by lead with those fits.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, ArrayView4, Axis};
use spidi_accumulate::{blend_forecast_ensemble, zero_floor};
use tracing::{debug, info};

use crate::config::SpiConfig;
use crate::error::SpiError;
use crate::fit::SpiFit;
use crate::monthly::validate_inputs;
use crate::partition::{evaluate_chunked, fit_chunked};

/// Observed monthly precipitation with the calendar date of every row.
#[derive(Debug, Clone, Copy)]
pub struct MonitoringRecord<'a> {
    precip: ArrayView2<'a, f64>,
    months: &'a [u8],
    years: &'a [i32],
}

impl<'a> MonitoringRecord<'a> {
    /// Wraps a `T x G` record whose row `t` is month `months[t]` of `years[t]`.
    ///
    /// # Errors
    ///
    /// Returns [`SpiError::EmptySamples`], [`SpiError::LengthMismatch`] or
    /// [`SpiError::InvalidMonth`] for an unusable record.
    pub fn new(
        precip: ArrayView2<'a, f64>,
        months: &'a [u8],
        years: &'a [i32],
    ) -> Result<Self, SpiError> {
        validate_inputs(precip, months, years)?;
        Ok(Self {
            precip,
            months,
            years,
        })
    }

    /// Number of grid points.
    pub fn n_points(&self) -> usize {
        self.precip.ncols()
    }

    /// Number of rows up to and including the month before `init_month` of
    /// `init_year`.
    fn rows_before(&self, init_year: i32, init_month: u8) -> Result<usize, SpiError> {
        let (year, month) = if init_month == 1 {
            (init_year - 1, 12)
        } else {
            (init_year, init_month - 1)
        };
        self.months
            .iter()
            .zip(self.years)
            .position(|(&m, &y)| m == month && y == year)
            .map(|t| t + 1)
            .ok_or(SpiError::MissingMonitoringMonth { year, month })
    }

    /// Zero-floored copy of the precipitation matrix.
    fn floored(&self, threshold: f64) -> Array2<f64> {
        let mut out = self.precip.to_owned();
        zero_floor(out.view_mut(), threshold);
        out
    }
}

fn check_init_month(init_month: u8) -> Result<(), SpiError> {
    if (1..=12).contains(&init_month) {
        Ok(())
    } else {
        Err(SpiError::InvalidMonth { month: init_month })
    }
}

fn check_points(
    forecast_points: usize,
    monitoring: &MonitoringRecord<'_>,
) -> Result<(), SpiError> {
    if forecast_points != monitoring.n_points() {
        return Err(SpiError::PointMismatch {
            samples: forecast_points,
            params: monitoring.n_points(),
        });
    }
    Ok(())
}

/// Fit one zero-inflated gamma distribution per lead from a hindcast.
///
/// `hindcast` is `year x member x lead x point` and holds the forecasts
/// initialised in `init_month` of each of `init_years`. For every lead the
/// `window`-month totals of all years and members are pooled into one
/// `(years * members) x points` sample and fitted chunk-wise. Values below
/// `config.min_precip()` are floored to zero in both the hindcast and the
/// monitoring record first.
///
/// The result holds one fit per lead, lead 1 first.
///
/// # Errors
///
/// Returns an error when the configuration is invalid, `init_month` is
/// outside 1..=12, the hindcast is empty or disagrees with `init_years` or
/// the monitoring grid, the monitoring record lacks the month before an
/// initialization, or a lead cannot be accumulated over `window` months.
#[tracing::instrument(skip_all, fields(n_years = init_years.len(), init_month = init_month, window = window))]
pub fn fit_forecast(
    hindcast: ArrayView4<'_, f64>,
    init_years: &[i32],
    init_month: u8,
    monitoring: &MonitoringRecord<'_>,
    window: usize,
    config: &SpiConfig,
) -> Result<Vec<SpiFit>, SpiError> {
    config.validate()?;
    check_init_month(init_month)?;
    let (n_years, n_members, n_leads, n_points) = hindcast.dim();
    if n_years != init_years.len() {
        return Err(SpiError::YearCountMismatch {
            hindcast: n_years,
            years: init_years.len(),
        });
    }
    if n_years == 0 || n_members == 0 || n_leads == 0 {
        return Err(SpiError::EmptySamples);
    }
    check_points(n_points, monitoring)?;

    let observed = monitoring.floored(config.min_precip());
    let ends = init_years
        .iter()
        .map(|&y| monitoring.rows_before(y, init_month))
        .collect::<Result<Vec<_>, _>>()?;
    let mut forecast = hindcast.to_owned();
    zero_floor(forecast.view_mut(), config.min_precip());

    let mut fits = Vec::with_capacity(n_leads);
    let mut pooled = Array2::zeros((n_years * n_members, n_points));
    for lead in 1..=n_leads {
        for (iy, &end) in ends.iter().enumerate() {
            let blended = blend_forecast_ensemble(
                forecast.index_axis(Axis(0), iy),
                observed.slice(s![..end, ..]),
                lead,
                window,
            )?;
            pooled
                .slice_mut(s![iy * n_members..(iy + 1) * n_members, ..])
                .assign(&blended);
        }

        let fit = fit_chunked(pooled.view(), config)?;
        info!(
            lead,
            n_samples = pooled.nrows(),
            n_valid = fit.n_valid(config.zero_max()),
            "fitted forecast lead"
        );
        fits.push(fit);
    }
    Ok(fits)
}

/// Standardise one forecast ensemble with per-lead fits.
///
/// `forecast` is `member x lead x point`, initialised in `init_month` of
/// `init_year`; `fits` holds one fit per lead as returned by
/// [`fit_forecast`]. Each lead is accumulated over `window` months exactly as
/// in the fit and evaluated chunk-wise. The result is `lead x member x point`.
///
/// # Errors
///
/// Returns [`SpiError::LeadCountMismatch`] when `fits` and the forecast
/// disagree on the number of leads, plus the input errors of
/// [`fit_forecast`].
#[tracing::instrument(skip_all, fields(init_year = init_year, init_month = init_month, window = window))]
pub fn forecast_spi(
    forecast: ArrayView3<'_, f64>,
    init_year: i32,
    init_month: u8,
    monitoring: &MonitoringRecord<'_>,
    window: usize,
    fits: &[SpiFit],
    config: &SpiConfig,
) -> Result<Array3<f64>, SpiError> {
    config.validate()?;
    check_init_month(init_month)?;
    let (n_members, n_leads, n_points) = forecast.dim();
    if fits.len() != n_leads {
        return Err(SpiError::LeadCountMismatch {
            fits: fits.len(),
            leads: n_leads,
        });
    }
    if n_members == 0 || n_leads == 0 {
        return Err(SpiError::EmptySamples);
    }
    check_points(n_points, monitoring)?;

    let observed = monitoring.floored(config.min_precip());
    let end = monitoring.rows_before(init_year, init_month)?;
    let mut floored = forecast.to_owned();
    zero_floor(floored.view_mut(), config.min_precip());

    let mut out = Array3::from_elem((n_leads, n_members, n_points), f64::NAN);
    for (i, fit) in fits.iter().enumerate() {
        let lead = i + 1;
        let blended =
            blend_forecast_ensemble(floored.view(), observed.slice(s![..end, ..]), lead, window)?;
        let spi = evaluate_chunked(blended.view(), fit, config)?;
        out.index_axis_mut(Axis(0), i).assign(&spi);
        debug!(lead, "standardised forecast lead");
    }
    Ok(out)
}
