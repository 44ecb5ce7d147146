//! Monthly SPI over a gridded precipitation record.

use std::ops::RangeInclusive;

use ndarray::{Array2, ArrayView2, Axis};
use spidi_accumulate::{rolling_sum, zero_floor};
use tracing::{info, warn};

use crate::config::SpiConfig;
use crate::error::SpiError;
use crate::fit::SpiFit;
use crate::partition::{evaluate_chunked, fit_chunked};

/// Output of [`monthly_spi`]: one fit per calendar month and the index series.
#[derive(Debug, Clone)]
pub struct MonthlySpi {
    fits: Vec<SpiFit>,
    spi: Array2<f64>,
}

impl MonthlySpi {
    /// Returns the fit for a 1-indexed calendar month.
    ///
    /// # Panics
    ///
    /// Panics if `month` is 0 or greater than 12.
    pub fn fit_for_month(&self, month: u8) -> &SpiFit {
        assert!(
            (1..=12).contains(&month),
            "month must be in 1..=12, got {month}"
        );
        &self.fits[(month - 1) as usize]
    }

    /// All twelve fits, January first.
    pub fn fits(&self) -> &[SpiFit] {
        &self.fits
    }

    /// The SPI series, same shape as the input record.
    pub fn spi(&self) -> ArrayView2<'_, f64> {
        self.spi.view()
    }

    /// Consumes `self` and returns the owned SPI series.
    pub fn into_spi(self) -> Array2<f64> {
        self.spi
    }
}

pub(crate) fn validate_inputs(
    precip: ArrayView2<'_, f64>,
    months: &[u8],
    years: &[i32],
) -> Result<(), SpiError> {
    if precip.nrows() == 0 {
        return Err(SpiError::EmptySamples);
    }
    if precip.nrows() != months.len() || precip.nrows() != years.len() {
        return Err(SpiError::LengthMismatch {
            rows: precip.nrows(),
            months: months.len(),
            years: years.len(),
        });
    }
    if let Some(&month) = months.iter().find(|m| !(1..=12).contains(*m)) {
        return Err(SpiError::InvalidMonth { month });
    }
    Ok(())
}

/// Compute the `window`-month SPI of a monthly precipitation record.
///
/// `precip` is a `T x G` matrix of monthly mean rates (time by grid point),
/// with `months` (1..=12) and `years` giving the date of each row. Values
/// below `config.min_precip()` are floored to zero, a trailing `window`-month
/// sum is formed, and a separate zero-inflated gamma fit is made for each
/// calendar month from the rows with a complete window whose year lies in
/// `fit_years` (all years when `None`). Every row is then standardised with
/// the fit of its own calendar month; rows without a complete window are NaN.
///
/// A calendar month with no fitting rows gets an all-undefined fit and an
/// all-NaN index, with a warning.
///
/// # Errors
///
/// Returns an error when the inputs are empty or inconsistent, a month is
/// out of range, the window is zero or longer than the record, or the
/// configuration is invalid.
#[tracing::instrument(skip_all, fields(n_months = precip.nrows(), n_points = precip.ncols(), window = window))]
pub fn monthly_spi(
    precip: ArrayView2<'_, f64>,
    months: &[u8],
    years: &[i32],
    window: usize,
    fit_years: Option<RangeInclusive<i32>>,
    config: &SpiConfig,
) -> Result<MonthlySpi, SpiError> {
    config.validate()?;
    validate_inputs(precip, months, years)?;

    let mut floored = precip.to_owned();
    zero_floor(floored.view_mut(), config.min_precip());
    let accumulated = rolling_sum(floored.view(), window, Axis(0))?;

    let n_rows = accumulated.nrows();
    let n_points = accumulated.ncols();
    let in_fit_period = |t: usize| fit_years.as_ref().map_or(true, |r| r.contains(&years[t]));

    let mut fits = Vec::with_capacity(12);
    let mut spi = Array2::from_elem((n_rows, n_points), f64::NAN);

    for month in 1u8..=12 {
        let fit_rows: Vec<usize> = (window - 1..n_rows)
            .filter(|&t| months[t] == month && in_fit_period(t))
            .collect();

        let fit = if fit_rows.is_empty() {
            warn!(month, "no complete windows in the fitting period; month left undefined");
            SpiFit::undefined(n_points)
        } else {
            fit_chunked(accumulated.select(Axis(0), &fit_rows).view(), config)?
        };
        info!(
            month,
            n_samples = fit_rows.len(),
            n_valid = fit.n_valid(config.zero_max()),
            "fitted calendar month"
        );

        let rows: Vec<usize> = (0..n_rows).filter(|&t| months[t] == month).collect();
        if !rows.is_empty() {
            let values =
                evaluate_chunked(accumulated.select(Axis(0), &rows).view(), &fit, config)?;
            for (i, &t) in rows.iter().enumerate() {
                spi.row_mut(t).assign(&values.row(i));
            }
        }
        fits.push(fit);
    }

    Ok(MonthlySpi { fits, spi })
}
