//! Climatology command: grouped mean of a field file.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use spidi_aggregate::{grouped_mean, GroupedMeanConfig, Strategy};
use spidi_io::{ParquetFieldSource, ParquetFieldWriter};

use crate::cli::ClimatologyArgs;
use crate::config::SpidiConfig;
use crate::convert;

/// Run the grouped-mean aggregation.
pub fn run(args: ClimatologyArgs, config: &SpidiConfig) -> Result<()> {
    let _cmd = info_span!("climatology", key = %args.key).entered();

    let mut agg_cfg = GroupedMeanConfig::new(&args.key);
    for f in &args.filters {
        agg_cfg = agg_cfg.with_filter(convert::parse_filter(f)?);
    }
    if args.replay {
        agg_cfg = agg_cfg.with_strategy(Strategy::Replay);
    }
    let writer_cfg = convert::build_writer_config(&config.io)?;

    let source = ParquetFieldSource::open(&args.input)
        .with_context(|| format!("failed to open field file: {}", args.input.display()))?;
    let mut writer = ParquetFieldWriter::create(&args.output, &writer_cfg)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    let summary = grouped_mean(&source, &mut writer, &agg_cfg).context("grouped mean failed")?;
    writer.close()?;

    info!(
        path = %args.output.display(),
        n_groups = summary.groups().len(),
        n_emitted = summary.emitted().len(),
        "climatology written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spidi_io::{FieldMeta, FieldSink, WriterConfig};
    use std::path::Path;

    fn write_input(path: &Path, fields: &[(i64, Vec<f64>)]) {
        let mut writer = ParquetFieldWriter::create(path, &WriterConfig::default()).unwrap();
        for (month, values) in fields {
            writer
                .write(values, &FieldMeta::new().with("month", *month))
                .unwrap();
        }
        writer.close().unwrap();
    }

    fn args(input: &Path, output: &Path, replay: bool) -> ClimatologyArgs {
        ClimatologyArgs {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            key: "month".to_string(),
            filters: Vec::new(),
            replay,
        }
    }

    #[test]
    fn writes_one_mean_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("monthly.parquet");
        let output = dir.path().join("clim.parquet");
        write_input(
            &input,
            &[(1, vec![1.0, 2.0]), (2, vec![5.0, 5.0]), (1, vec![3.0, 4.0])],
        );

        run(args(&input, &output, false), &SpidiConfig::default()).unwrap();

        let means = ParquetFieldSource::open(&output)
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].values(), &[2.0, 3.0]);
        assert_eq!(means[1].meta().get("month"), Some(2));
    }

    #[test]
    fn failed_run_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("monthly.parquet");
        let output = dir.path().join("clim.parquet");
        write_input(&input, &[(1, vec![1.0, 2.0]), (2, vec![1.0])]);

        for replay in [false, true] {
            let err = run(args(&input, &output, replay), &SpidiConfig::default()).unwrap_err();
            assert!(format!("{err:#}").contains("grid points"));
            assert!(!output.exists());
            let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
            assert_eq!(leftovers, 1);
        }
    }
}
