//! Multiplicative bias correction of forecast precipitation.
//!
//! A forecast initialised in month `m0` is valid in month
//! `add_months(m0, lead - 1)` at lead `lead`. The correction factor for that
//! lead is the ratio of the observed climatology of the valid month to the
//! hindcast climatology of the lead, both floored and the ratio clamped.

use spidi_io::{Field, FieldSink, FieldSource};
use tracing::{debug, info};

use crate::config::BiasConfig;
use crate::error::AggregateError;

/// Metadata key of the calendar month in observed climatologies and factors.
pub const MONTH_KEY: &str = "month";

/// Calendar month `n` months after `month`, both 1-based, wrapping 12 to 1.
///
/// `n` may be negative and of any magnitude.
///
/// # Example
///
/// ```
/// use spidi_aggregate::add_months;
///
/// assert_eq!(add_months(11, 3), 2);
/// assert_eq!(add_months(1, -1), 12);
/// ```
pub fn add_months(month: u8, n: i64) -> u8 {
    ((i64::from(month) - 1 + n.rem_euclid(12)).rem_euclid(12) + 1) as u8
}

/// Element-wise factor `clamp(max(floor, obs) / max(floor, hind), min, max)`.
///
/// A NaN in either input gives a NaN factor.
///
/// # Errors
///
/// Returns [`AggregateError::GridMismatch`] if the slices differ in length and
/// [`AggregateError::InvalidConfig`] for an invalid configuration.
pub fn bias_factors(
    observed: &[f64],
    hindcast: &[f64],
    config: &BiasConfig,
) -> Result<Vec<f64>, AggregateError> {
    config.validate()?;
    if observed.len() != hindcast.len() {
        return Err(AggregateError::GridMismatch {
            left: observed.len(),
            right: hindcast.len(),
        });
    }

    let floor = config.floor();
    Ok(observed
        .iter()
        .zip(hindcast)
        .map(|(&o, &h)| {
            if o.is_nan() || h.is_nan() {
                f64::NAN
            } else {
                (o.max(floor) / h.max(floor)).clamp(config.min_factor(), config.max_factor())
            }
        })
        .collect())
}

/// Multiplies `values` element-wise by `factors` in place.
///
/// # Errors
///
/// Returns [`AggregateError::GridMismatch`] if the slices differ in length.
pub fn apply_factors(values: &mut [f64], factors: &[f64]) -> Result<(), AggregateError> {
    if values.len() != factors.len() {
        return Err(AggregateError::GridMismatch {
            left: values.len(),
            right: factors.len(),
        });
    }
    for (v, f) in values.iter_mut().zip(factors) {
        *v *= f;
    }
    Ok(())
}

/// Bias factors for every lead of a forecast initialised in `init_month`.
///
/// `observed` holds one climatology field per calendar month (metadata key
/// `month`); `hindcast` holds one climatology field per lead (metadata key
/// `lead_key`, 1-based). One factor field is returned per hindcast field, in
/// hindcast order, carrying the hindcast metadata plus the valid `month`.
///
/// # Errors
///
/// Returns [`AggregateError::InvalidMonth`] if `init_month` is outside
/// 1..=12, [`AggregateError::InvalidLead`] for a lead below 1,
/// [`AggregateError::MissingClimatology`] if no observed field exists for a
/// valid month, and any error from [`bias_factors`].
#[tracing::instrument(skip(observed, hindcast, config), fields(n_leads = hindcast.len()))]
pub fn lead_factors(
    observed: &[Field],
    hindcast: &[Field],
    init_month: u8,
    lead_key: &str,
    config: &BiasConfig,
) -> Result<Vec<Field>, AggregateError> {
    if !(1..=12).contains(&init_month) {
        return Err(AggregateError::InvalidMonth {
            month: i64::from(init_month),
        });
    }

    let mut out = Vec::with_capacity(hindcast.len());
    for hind in hindcast {
        let lead = hind.meta().require(lead_key)?;
        if lead < 1 {
            return Err(AggregateError::InvalidLead { lead });
        }
        let month = add_months(init_month, lead - 1);

        let mut obs = None;
        for f in observed {
            if f.meta().require(MONTH_KEY)? == i64::from(month) {
                obs = Some(f);
                break;
            }
        }
        let obs = obs.ok_or_else(|| AggregateError::MissingClimatology {
            key: MONTH_KEY.to_string(),
            value: i64::from(month),
        })?;

        let factors = bias_factors(obs.values(), hind.values(), config)?;
        let mut meta = hind.meta().clone();
        meta.set(MONTH_KEY, i64::from(month));
        debug!(lead, month, "computed bias factors");
        out.push(Field::new(factors, meta));
    }
    Ok(out)
}

/// Corrects every field of `source` with the factor field of its lead and
/// writes the result to `sink`, preserving metadata.
///
/// Returns the number of fields written.
///
/// # Errors
///
/// Returns [`AggregateError::MissingClimatology`] when no factor field exists
/// for a field's lead, plus any read, write or grid-size error.
#[tracing::instrument(skip_all, fields(lead_key = lead_key))]
pub fn correct_stream<S, W>(
    source: &S,
    sink: &mut W,
    factors: &[Field],
    lead_key: &str,
) -> Result<usize, AggregateError>
where
    S: FieldSource + ?Sized,
    W: FieldSink + ?Sized,
{
    let mut by_lead = std::collections::BTreeMap::new();
    for f in factors {
        by_lead.insert(f.meta().require(lead_key)?, f.values());
    }

    let mut n_written = 0usize;
    for field in source.fields()? {
        let (mut values, meta) = field?.into_parts();
        let lead = meta.require(lead_key)?;
        let factor = by_lead
            .get(&lead)
            .ok_or_else(|| AggregateError::MissingClimatology {
                key: lead_key.to_string(),
                value: lead,
            })?;
        apply_factors(&mut values, factor)?;
        sink.write(&values, &meta)?;
        n_written += 1;
    }

    info!(n_written, "bias correction applied");
    Ok(n_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spidi_io::{FieldMeta, MemoryStore};

    #[test]
    fn add_months_wraps() {
        assert_eq!(add_months(1, 0), 1);
        assert_eq!(add_months(12, 1), 1);
        assert_eq!(add_months(5, 6), 11);
        assert_eq!(add_months(3, -3), 12);
        assert_eq!(add_months(7, 24), 7);
    }

    #[test]
    fn add_months_extreme_offsets() {
        assert_eq!(add_months(1, i64::MAX), add_months(1, i64::MAX % 12));
        assert_eq!(add_months(12, i64::MIN), add_months(12, i64::MIN % 12));
        assert_eq!(add_months(255, i64::MAX), add_months(255, 7));
    }

    #[test]
    fn factors_are_floored_and_clamped() {
        let config = BiasConfig::new();
        let obs = [2.0, 0.0, 10.0, 1.0, 0.01];
        let hind = [1.0, 1.0, 1.0, 0.0, 0.02];
        let f = bias_factors(&obs, &hind, &config).unwrap();

        assert_relative_eq!(f[0], 2.0);
        // 0.03 / 1.0 clamps up to 0.2
        assert_relative_eq!(f[1], 0.2);
        assert_relative_eq!(f[2], 5.0);
        // 1.0 / 0.03 clamps down to 5.0
        assert_relative_eq!(f[3], 5.0);
        // Both below the floor
        assert_relative_eq!(f[4], 1.0);
    }

    #[test]
    fn nan_gives_nan_factor() {
        let f = bias_factors(&[f64::NAN, 1.0], &[1.0, f64::NAN], &BiasConfig::new()).unwrap();
        assert!(f[0].is_nan());
        assert!(f[1].is_nan());
    }

    #[test]
    fn factor_grid_mismatch() {
        let err = bias_factors(&[1.0], &[1.0, 2.0], &BiasConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::GridMismatch { left: 1, right: 2 }
        ));
    }

    #[test]
    fn apply_multiplies() {
        let mut values = vec![1.0, 2.0, f64::NAN];
        apply_factors(&mut values, &[0.5, 3.0, 2.0]).unwrap();
        assert_eq!(values[..2], [0.5, 6.0]);
        assert!(values[2].is_nan());
        assert!(apply_factors(&mut values, &[1.0]).is_err());
    }

    fn clim(value: f64, key: &str, k: i64) -> Field {
        Field::new(vec![value, value], FieldMeta::new().with(key, k))
    }

    #[test]
    fn lead_factors_follow_valid_month() {
        let observed: Vec<Field> = (1..=12).map(|m| clim(m as f64, "month", m)).collect();
        let hindcast: Vec<Field> = (1..=3).map(|l| clim(1.0, "lead", l)).collect();

        // Initialised in November: leads 1..=3 are valid in Nov, Dec, Jan.
        let factors = lead_factors(&observed, &hindcast, 11, "lead", &BiasConfig::new()).unwrap();
        let months: Vec<i64> = factors.iter().map(|f| f.meta().get("month").unwrap()).collect();
        assert_eq!(months, vec![11, 12, 1]);
        assert_relative_eq!(factors[0].values()[0], 5.0);
        assert_relative_eq!(factors[2].values()[0], 1.0);
        assert_eq!(factors[1].meta().get("lead"), Some(2));
    }

    #[test]
    fn lead_factors_missing_month() {
        let observed = vec![clim(1.0, "month", 1)];
        let hindcast = vec![clim(1.0, "lead", 2)];
        let err = lead_factors(&observed, &hindcast, 1, "lead", &BiasConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::MissingClimatology { value: 2, .. }
        ));
    }

    #[test]
    fn lead_factors_reject_non_positive_lead() {
        let observed: Vec<Field> = (1..=12).map(|m| clim(1.0, "month", m)).collect();
        for lead in [0, i64::MIN] {
            let hindcast = vec![clim(1.0, "lead", lead)];
            let err =
                lead_factors(&observed, &hindcast, 1, "lead", &BiasConfig::new()).unwrap_err();
            assert!(matches!(err, AggregateError::InvalidLead { lead: l } if l == lead));
        }
    }

    #[test]
    fn lead_factors_accept_very_large_lead() {
        let observed: Vec<Field> = (1..=12).map(|m| clim(m as f64, "month", m)).collect();
        let hindcast = vec![clim(1.0, "lead", i64::MAX)];
        let factors = lead_factors(&observed, &hindcast, 1, "lead", &BiasConfig::new()).unwrap();
        assert_eq!(
            factors[0].meta().get("month"),
            Some(i64::from(add_months(1, i64::MAX - 1)))
        );
    }

    #[test]
    fn lead_factors_invalid_init_month() {
        let err = lead_factors(&[], &[], 13, "lead", &BiasConfig::new()).unwrap_err();
        assert!(matches!(err, AggregateError::InvalidMonth { month: 13 }));
    }

    #[test]
    fn correct_stream_matches_leads() {
        let factors = vec![clim(2.0, "lead", 1), clim(0.5, "lead", 2)];
        let source = MemoryStore::from(vec![
            Field::new(vec![1.0, 4.0], FieldMeta::new().with("lead", 2).with("member", 0)),
            Field::new(vec![3.0, 3.0], FieldMeta::new().with("lead", 1).with("member", 0)),
        ]);
        let mut sink = MemoryStore::new();
        let n = correct_stream(&source, &mut sink, &factors, "lead").unwrap();

        assert_eq!(n, 2);
        assert_eq!(sink.as_slice()[0].values(), &[0.5, 2.0]);
        assert_eq!(sink.as_slice()[1].values(), &[6.0, 6.0]);
        assert_eq!(sink.as_slice()[0].meta().get("member"), Some(0));
    }

    #[test]
    fn correct_stream_missing_lead() {
        let source = MemoryStore::from(vec![clim(1.0, "lead", 3)]);
        let mut sink = MemoryStore::new();
        let result = correct_stream(&source, &mut sink, &[], "lead");
        assert!(matches!(
            result,
            Err(AggregateError::MissingClimatology { value: 3, .. })
        ));
        assert!(sink.is_empty());
    }
}
