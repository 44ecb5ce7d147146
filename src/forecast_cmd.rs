//! Forecast SPI command: per-lead fits on hindcast years and SPI of a forecast.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{s, Array1, Array4, ArrayView1, Axis};
use tracing::{info, info_span};

use spidi_io::{
    FieldMeta, FieldSink, ParamSet, ParamStore, ParquetFieldSource, ParquetFieldWriter,
};
use spidi_spi::{fit_forecast, forecast_spi, MonitoringRecord, SpiFit};

use crate::cli::{ForecastMode, SpiForecastArgs};
use crate::config::{ForecastToml, SpidiConfig};
use crate::convert;
use crate::spi_cmd::read_monitoring;

/// Forecast fields laid out as year x member x lead x point.
struct Ensemble {
    data: Array4<f64>,
    years: Vec<i32>,
    /// Metadata of every field, indexed like `data` without the point axis.
    metas: Vec<FieldMeta>,
}

impl Ensemble {
    fn n_members(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    fn n_leads(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    fn meta(&self, year: usize, member: usize, lead: usize) -> &FieldMeta {
        &self.metas[(year * self.n_members() + member) * self.n_leads() + lead]
    }
}

/// Parameter tag of a forecast system, product and initialization month.
fn param_tag(forecast: &ForecastToml, init_month: u8) -> String {
    format!("{}_{}_{init_month:02}", forecast.ftype, forecast.fortype)
}

/// Run the forecast SPI pipeline in the requested mode.
pub fn run(args: SpiForecastArgs, config: &SpidiConfig) -> Result<()> {
    let _cmd = info_span!(
        "spi-forecast",
        mode = ?args.mode,
        time_scale = args.time_scale,
        init_month = args.init_month
    )
    .entered();

    let mut spi_cfg = convert::build_spi_config(&config.spi)?;
    if let Some(n) = args.max_chunk {
        spi_cfg = spi_cfg.with_max_chunk(n);
    }
    let writer_cfg = convert::build_writer_config(&config.io)?;
    let tag = param_tag(&config.forecast, args.init_month);

    info!(path = %args.monitoring.display(), "reading monitoring record");
    let monitoring = read_monitoring(&args.monitoring)?;
    let record = MonitoringRecord::new(
        monitoring.precip.view(),
        &monitoring.months,
        &monitoring.years,
    )
    .context("invalid monitoring record")?;

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            args.output_dir.display()
        )
    })?;

    match args.mode {
        ForecastMode::Fit => {
            let hind_years = args
                .hind_years
                .as_deref()
                .map(convert::parse_year_range)
                .transpose()?;
            let hindcast = read_ensemble(&args.forecast, &config.forecast, |y| {
                hind_years.as_ref().map_or(true, |r| r.contains(&y))
            })?;
            info!(
                n_years = hindcast.years.len(),
                n_members = hindcast.n_members(),
                n_leads = hindcast.n_leads(),
                "hindcast loaded"
            );

            let fits = fit_forecast(
                hindcast.data.view(),
                &hindcast.years,
                args.init_month,
                &record,
                args.time_scale,
                &spi_cfg,
            )
            .context("forecast fit failed")?;

            let store = ParamStore::new(&args.output_dir).with_writer_config(writer_cfg);
            store
                .save(args.time_scale, &tag, &param_sets(&fits)?)
                .context("failed to save fit parameters")?;
            info!(dir = %store.dir().display(), tag = %tag, "forecast parameters saved");
        }
        ForecastMode::Compute => {
            let forecast = read_ensemble(&args.forecast, &config.forecast, |y| {
                args.year.map_or(true, |target| y == target)
            })?;
            let year = match forecast.years.as_slice() {
                [year] => *year,
                [] => bail!("no forecast fields for the requested year"),
                years => bail!(
                    "forecast file holds {} years; select one with --year",
                    years.len()
                ),
            };

            let params_dir = args.params_dir.as_deref().unwrap_or(args.output_dir.as_path());
            let sets = ParamStore::new(params_dir)
                .load(args.time_scale, &tag)
                .with_context(|| format!("failed to load parameters {tag}"))?;
            let fits = lead_fits(&sets)?;

            let spi = forecast_spi(
                forecast.data.index_axis(Axis(0), 0),
                year,
                args.init_month,
                &record,
                args.time_scale,
                &fits,
                &spi_cfg,
            )
            .context("forecast SPI failed")?;

            let path = args
                .output_dir
                .join(format!("SPI{}_{tag}_{year}.parquet", args.time_scale));
            let mut writer = ParquetFieldWriter::create(&path, &writer_cfg)
                .with_context(|| format!("failed to create {}", path.display()))?;
            for (lead, by_member) in spi.outer_iter().enumerate() {
                for (member, values) in by_member.outer_iter().enumerate() {
                    writer.write(&values.to_vec(), forecast.meta(0, member, lead))?;
                }
            }
            let n = writer.close()?;
            info!(path = %path.display(), n_fields = n, "forecast SPI written");
        }
    }
    Ok(())
}

/// Reads every field of `path` whose `year` passes `keep` into an ensemble.
///
/// Every (year, member, lead) must occur exactly once and leads must run
/// from 1 without gaps.
fn read_ensemble(
    path: &Path,
    keys: &ForecastToml,
    keep: impl Fn(i32) -> bool,
) -> Result<Ensemble> {
    let fields = ParquetFieldSource::open(path)
        .and_then(|s| s.read_all())
        .with_context(|| format!("failed to read field file: {}", path.display()))?;

    let mut located = Vec::with_capacity(fields.len());
    for (i, field) in fields.into_iter().enumerate() {
        let year = field.meta().require("year")?;
        let year = i32::try_from(year).with_context(|| format!("field {i}: year {year}"))?;
        if !keep(year) {
            continue;
        }
        let member = field.meta().require(&keys.member_key)?;
        let lead = field.meta().require(&keys.lead_key)?;
        let lead = usize::try_from(lead)
            .ok()
            .filter(|&l| l >= 1)
            .with_context(|| format!("field {i}: lead {lead} must be 1 or more"))?;
        located.push((year, member, lead, field));
    }
    let Some(n_points) = located.first().map(|(_, _, _, f)| f.len()) else {
        return Ok(Ensemble {
            data: Array4::zeros((0, 0, 0, 0)),
            years: Vec::new(),
            metas: Vec::new(),
        });
    };

    let years: Vec<i32> = located
        .iter()
        .map(|(y, ..)| *y)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let members: Vec<i64> = located
        .iter()
        .map(|(_, m, ..)| *m)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let n_leads = located.iter().map(|(_, _, l, _)| *l).max().unwrap_or(0);

    let shape = (years.len(), members.len(), n_leads);
    let mut data = Array4::from_elem((shape.0, shape.1, shape.2, n_points), f64::NAN);
    let mut metas: Vec<Option<FieldMeta>> = vec![None; shape.0 * shape.1 * shape.2];
    for (year, member, lead, field) in located {
        ensure!(
            field.len() == n_points,
            "field for year {year}, member {member}, lead {lead} has {} grid points, expected {n_points}",
            field.len()
        );
        let iy = years.binary_search(&year).unwrap_or_default();
        let im = members.binary_search(&member).unwrap_or_default();
        let slot = (iy * shape.1 + im) * shape.2 + lead - 1;
        ensure!(
            metas[slot].is_none(),
            "duplicate field for year {year}, member {member}, lead {lead}"
        );
        let (values, meta) = field.into_parts();
        data.slice_mut(s![iy, im, lead - 1, ..])
            .assign(&ArrayView1::from(&values));
        metas[slot] = Some(meta);
    }

    let metas = metas
        .into_iter()
        .enumerate()
        .map(|(slot, meta)| {
            meta.with_context(|| {
                let lead = slot % shape.2 + 1;
                let member = members[slot / shape.2 % shape.1];
                let year = years[slot / (shape.1 * shape.2)];
                format!("missing field for year {year}, member {member}, lead {lead}")
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Ensemble { data, years, metas })
}

/// One parameter set per lead, indexed from 1.
fn param_sets(fits: &[SpiFit]) -> Result<Vec<ParamSet>> {
    fits.iter()
        .zip(1i64..)
        .map(|(fit, lead)| {
            Ok(ParamSet::new(
                lead,
                fit.shape().to_vec(),
                fit.scale().to_vec(),
                fit.zero_prob().to_vec(),
            )?)
        })
        .collect()
}

/// Rebuilds per-lead fits from stored parameter sets, which must be indexed 1, 2, ...
fn lead_fits(sets: &[ParamSet]) -> Result<Vec<SpiFit>> {
    sets.iter()
        .zip(1i64..)
        .map(|(set, lead)| {
            ensure!(
                set.index() == lead,
                "stored parameters hold index {} where lead {lead} was expected",
                set.index()
            );
            Ok(SpiFit::new(
                Array1::from(set.shape().to_vec()),
                Array1::from(set.scale().to_vec()),
                Array1::from(set.zero_prob().to_vec()),
            )?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spidi_io::WriterConfig;
    use spidi_spi::SpiConfig;
    use std::path::PathBuf;

    const N_POINTS: usize = 2;

    fn precip(seed: usize) -> f64 {
        0.5 + ((seed * 37 + 11) % 17) as f64
    }

    /// Monthly record from January 1999 to December 2010.
    fn write_monitoring(path: &Path) {
        let mut writer = ParquetFieldWriter::create(path, &WriterConfig::default()).unwrap();
        for t in 0..12 * 12 {
            let meta = FieldMeta::new()
                .with("year", 1999 + (t / 12) as i64)
                .with("month", (t % 12) as i64 + 1);
            let values: Vec<f64> = (0..N_POINTS).map(|p| precip(t * 3 + p)).collect();
            writer.write(&values, &meta).unwrap();
        }
        writer.close().unwrap();
    }

    /// Forecasts for `years` with 4 members and 3 leads.
    fn write_forecast(path: &Path, years: std::ops::RangeInclusive<i64>) {
        let mut writer = ParquetFieldWriter::create(path, &WriterConfig::default()).unwrap();
        for year in years {
            for lead in 1..=3i64 {
                for member in 0..4i64 {
                    let meta = FieldMeta::new()
                        .with("year", year)
                        .with("forecastMonth", lead)
                        .with("number", member);
                    let seed = (year as usize) * 13 + (lead as usize) * 7 + member as usize * 5;
                    let values: Vec<f64> = (0..N_POINTS).map(|p| precip(seed + p)).collect();
                    writer.write(&values, &meta).unwrap();
                }
            }
        }
        writer.close().unwrap();
    }

    fn args(mode: ForecastMode, dir: &Path, forecast: PathBuf) -> SpiForecastArgs {
        SpiForecastArgs {
            mode,
            monitoring: dir.join("monitoring.parquet"),
            forecast,
            init_month: 3,
            time_scale: 3,
            output_dir: dir.join("out"),
            params_dir: None,
            hind_years: None,
            year: None,
            max_chunk: Some(1),
        }
    }

    #[test]
    fn parameters_round_trip_into_forecast_spi() {
        let dir = tempfile::tempdir().unwrap();
        write_monitoring(&dir.path().join("monitoring.parquet"));
        let hindcast = dir.path().join("hindcast.parquet");
        write_forecast(&hindcast, 2000..=2009);
        let forecast = dir.path().join("forecast.parquet");
        write_forecast(&forecast, 2010..=2010);
        let config = SpidiConfig::default();

        run(args(ForecastMode::Fit, dir.path(), hindcast.clone()), &config).unwrap();
        let store = ParamStore::new(dir.path().join("out"));
        let sets = store.load(3, "SEAS5_ENS_03").unwrap();
        let index: Vec<i64> = sets.iter().map(ParamSet::index).collect();
        assert_eq!(index, vec![1, 2, 3]);

        run(args(ForecastMode::Compute, dir.path(), forecast.clone()), &config).unwrap();
        let out = dir.path().join("out").join("SPI3_SEAS5_ENS_03_2010.parquet");
        let written = ParquetFieldSource::open(&out).unwrap().read_all().unwrap();
        assert_eq!(written.len(), 3 * 4);
        assert_eq!(written[5].meta().get("forecastMonth"), Some(2));
        assert_eq!(written[5].meta().get("number"), Some(1));

        // Same result as fitting and evaluating in memory.
        let monitoring = read_monitoring(&dir.path().join("monitoring.parquet")).unwrap();
        let record = MonitoringRecord::new(
            monitoring.precip.view(),
            &monitoring.months,
            &monitoring.years,
        )
        .unwrap();
        let keys = ForecastToml::default();
        let hind = read_ensemble(&hindcast, &keys, |_| true).unwrap();
        let spi_cfg = SpiConfig::new();
        let fits = fit_forecast(hind.data.view(), &hind.years, 3, &record, 3, &spi_cfg).unwrap();
        let fc = read_ensemble(&forecast, &keys, |_| true).unwrap();
        let expected = forecast_spi(
            fc.data.index_axis(Axis(0), 0),
            2010,
            3,
            &record,
            3,
            &fits,
            &spi_cfg,
        )
        .unwrap();

        assert!(expected.iter().any(|v| v.is_finite()));
        for (i, field) in written.iter().enumerate() {
            let values = expected.slice(s![i / 4, i % 4, ..]);
            for (a, b) in field.values().iter().zip(values.iter()) {
                assert!(a == b || (a.is_nan() && b.is_nan()), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn compute_without_parameters_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        write_monitoring(&dir.path().join("monitoring.parquet"));
        let forecast = dir.path().join("forecast.parquet");
        write_forecast(&forecast, 2010..=2010);

        let err = run(
            args(ForecastMode::Compute, dir.path(), forecast),
            &SpidiConfig::default(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("SEAS5_ENS_03"));
        let out = dir.path().join("out");
        assert_eq!(std::fs::read_dir(out).unwrap().count(), 0);
    }

    #[test]
    fn compute_needs_a_single_year() {
        let dir = tempfile::tempdir().unwrap();
        write_monitoring(&dir.path().join("monitoring.parquet"));
        let forecast = dir.path().join("forecast.parquet");
        write_forecast(&forecast, 2009..=2010);

        let err = run(
            args(ForecastMode::Compute, dir.path(), forecast),
            &SpidiConfig::default(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("--year"));
    }

    #[test]
    fn ensemble_layout_follows_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.parquet");
        write_forecast(&path, 2001..=2002);

        let ens = read_ensemble(&path, &ForecastToml::default(), |y| y == 2002).unwrap();
        assert_eq!(ens.years, vec![2002]);
        assert_eq!(ens.data.dim(), (1, 4, 3, N_POINTS));
        let meta = ens.meta(0, 3, 1);
        assert_eq!(meta.get("number"), Some(3));
        assert_eq!(meta.get("forecastMonth"), Some(2));
        let seed = 2002 * 13 + 2 * 7 + 3 * 5;
        assert_eq!(ens.data[[0, 3, 1, 1]], precip(seed + 1));
    }

    #[test]
    fn ensemble_with_missing_member_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.parquet");
        let mut writer = ParquetFieldWriter::create(&path, &WriterConfig::default()).unwrap();
        for (lead, member) in [(1, 0), (1, 1), (2, 0)] {
            let meta = FieldMeta::new()
                .with("year", 2000)
                .with("forecastMonth", lead)
                .with("number", member);
            writer.write(&[1.0], &meta).unwrap();
        }
        writer.close().unwrap();

        let err = read_ensemble(&path, &ForecastToml::default(), |_| true)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("missing field for year 2000, member 1, lead 2"));
    }

    #[test]
    fn lead_fits_require_consecutive_index() {
        let set = |i| ParamSet::new(i, vec![1.0], vec![1.0], vec![0.0]).unwrap();
        assert_eq!(lead_fits(&[set(1), set(2)]).unwrap().len(), 2);
        assert!(lead_fits(&[set(1), set(3)]).is_err());
    }

    #[test]
    fn tag_pads_the_month() {
        assert_eq!(param_tag(&ForecastToml::default(), 5), "SEAS5_ENS_05");
    }
}
