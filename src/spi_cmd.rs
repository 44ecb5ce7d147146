//! Monthly SPI command: fit gamma parameters per calendar month and write SPI fields.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use tracing::{info, info_span};

use spidi_io::{
    FieldMeta, FieldSink, ParamSet, ParamStore, ParquetFieldSource, ParquetFieldWriter,
    WriterConfig,
};
use spidi_spi::{monthly_spi, MonthlySpi};

use crate::cli::SpiMonthlyArgs;
use crate::config::SpidiConfig;
use crate::convert;

/// Tag of monthly parameters and SPI fields fitted on the monitoring record.
const MONTHLY_TAG: &str = "MON_HIND";

/// Monitoring record laid out as months x grid points.
pub(crate) struct Monitoring {
    pub(crate) precip: Array2<f64>,
    pub(crate) months: Vec<u8>,
    pub(crate) years: Vec<i32>,
    pub(crate) metas: Vec<FieldMeta>,
}

/// Run the monthly SPI pipeline.
pub fn run(args: SpiMonthlyArgs, config: &SpidiConfig) -> Result<()> {
    let _cmd = info_span!("spi-monthly", time_scale = args.time_scale).entered();

    let mut spi_cfg = convert::build_spi_config(&config.spi)?;
    if let Some(n) = args.max_chunk {
        spi_cfg = spi_cfg.with_max_chunk(n);
    }
    let writer_cfg = convert::build_writer_config(&config.io)?;
    let fit_years = args
        .fit_years
        .as_deref()
        .map(convert::parse_year_range)
        .transpose()?;

    info!(path = %args.input.display(), "reading monitoring record");
    let record = read_monitoring(&args.input)?;
    info!(
        n_months = record.precip.nrows(),
        n_points = record.precip.ncols(),
        "monitoring record loaded"
    );

    let result = monthly_spi(
        record.precip.view(),
        &record.months,
        &record.years,
        args.time_scale,
        fit_years,
        &spi_cfg,
    )
    .context("monthly SPI failed")?;

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            args.output_dir.display()
        )
    })?;

    let store = ParamStore::new(&args.output_dir).with_writer_config(writer_cfg.clone());
    store
        .save(args.time_scale, MONTHLY_TAG, &param_sets(&result)?)
        .context("failed to save fit parameters")?;
    info!(dir = %store.dir().display(), "fit parameters saved");

    let spi_path = args
        .output_dir
        .join(format!("SPI{}_{MONTHLY_TAG}.parquet", args.time_scale));
    let n = write_spi(&spi_path, &result, &record.metas, &writer_cfg)?;
    info!(path = %spi_path.display(), n_fields = n, "SPI fields written");

    Ok(())
}

/// Reads every field of `path` as one row of the monitoring matrix.
pub(crate) fn read_monitoring(path: &Path) -> Result<Monitoring> {
    let fields = ParquetFieldSource::open(path)
        .and_then(|s| s.read_all())
        .with_context(|| format!("failed to read field file: {}", path.display()))?;
    let Some(first) = fields.first() else {
        bail!("field file {} holds no fields", path.display());
    };
    let n_points = first.len();

    let mut flat = Vec::with_capacity(fields.len() * n_points);
    let mut months = Vec::with_capacity(fields.len());
    let mut years = Vec::with_capacity(fields.len());
    let mut metas = Vec::with_capacity(fields.len());
    for (t, field) in fields.into_iter().enumerate() {
        if field.len() != n_points {
            bail!(
                "field {t} has {} grid points, expected {n_points}",
                field.len()
            );
        }
        let month = field.meta().require("month")?;
        let year = field.meta().require("year")?;
        months.push(u8::try_from(month).with_context(|| format!("field {t}: month {month}"))?);
        years.push(i32::try_from(year).with_context(|| format!("field {t}: year {year}"))?);

        let (values, meta) = field.into_parts();
        flat.extend(values);
        metas.push(meta);
    }

    let precip = Array2::from_shape_vec((months.len(), n_points), flat)
        .context("failed to assemble monitoring matrix")?;
    Ok(Monitoring {
        precip,
        months,
        years,
        metas,
    })
}

/// One parameter set per calendar month, indexed 1..=12.
fn param_sets(result: &MonthlySpi) -> Result<Vec<ParamSet>> {
    (1..=12u8)
        .map(|m| {
            let fit = result.fit_for_month(m);
            Ok(ParamSet::new(
                i64::from(m),
                fit.shape().to_vec(),
                fit.scale().to_vec(),
                fit.zero_prob().to_vec(),
            )?)
        })
        .collect()
}

fn write_spi(
    path: &Path,
    result: &MonthlySpi,
    metas: &[FieldMeta],
    config: &WriterConfig,
) -> Result<usize> {
    let mut writer = ParquetFieldWriter::create(path, config)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for (row, meta) in result.spi().rows().into_iter().zip(metas) {
        writer.write(&row.to_vec(), meta)?;
    }
    Ok(writer.close()?)
}
