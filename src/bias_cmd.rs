//! Bias-correction command: per-lead factors from climatologies, optionally applied to ensembles.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use spidi_aggregate::{correct_stream, lead_factors};
use spidi_io::{Field, FieldSink, ParquetFieldSource, ParquetFieldWriter, WriterConfig};

use crate::cli::BiasCorrectArgs;
use crate::config::SpidiConfig;
use crate::convert;

/// Run the bias-correction pipeline.
pub fn run(args: BiasCorrectArgs, config: &SpidiConfig) -> Result<()> {
    let _cmd = info_span!("bias-correct", init_month = args.init_month).entered();

    let bias_cfg = convert::build_bias_config(&config.bias)?;
    let writer_cfg = convert::build_writer_config(&config.io)?;
    let lead_key = config.bias.lead_key.as_str();
    let targets = args
        .apply
        .iter()
        .map(|s| convert::parse_apply(s))
        .collect::<Result<Vec<_>>>()?;

    let observed = read_fields(&args.observed)?;
    let hindcast = read_fields(&args.hindcast)?;
    info!(
        n_observed = observed.len(),
        n_leads = hindcast.len(),
        "climatologies loaded"
    );

    let factors = lead_factors(&observed, &hindcast, args.init_month, lead_key, &bias_cfg)
        .context("failed to compute bias factors")?;
    write_fields(&args.output, &factors, &writer_cfg)?;
    info!(path = %args.output.display(), "bias factors written");

    for (input, output) in &targets {
        let source = ParquetFieldSource::open(Path::new(input))
            .with_context(|| format!("failed to open ensemble file: {input}"))?;
        let mut writer = ParquetFieldWriter::create(Path::new(output), &writer_cfg)
            .with_context(|| format!("failed to create {output}"))?;
        let n = correct_stream(&source, &mut writer, &factors, lead_key)
            .with_context(|| format!("failed to correct {input}"))?;
        writer.close()?;
        info!(input = %input, output = %output, n_fields = n, "ensemble corrected");
    }

    Ok(())
}

fn read_fields(path: &Path) -> Result<Vec<Field>> {
    ParquetFieldSource::open(path)
        .and_then(|s| s.read_all())
        .with_context(|| format!("failed to read field file: {}", path.display()))
}

fn write_fields(path: &Path, fields: &[Field], config: &WriterConfig) -> Result<()> {
    let mut writer = ParquetFieldWriter::create(path, config)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for f in fields {
        writer.write(f.values(), f.meta())?;
    }
    writer.close()?;
    Ok(())
}
