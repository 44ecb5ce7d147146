//! Pure conversion functions: TOML config structs and CLI strings -> crate API types.

use std::ops::RangeInclusive;

use anyhow::{bail, Context, Result};

use crate::config::*;

use spidi_aggregate::{BiasConfig, RangeFilter};
use spidi_io::{Compression, WriterConfig};
use spidi_spi::SpiConfig;

/// Parses a compression algorithm name string into the corresponding enum variant.
pub fn parse_compression(s: &str) -> Result<Compression> {
    match s.to_lowercase().as_str() {
        "none" => Ok(Compression::None),
        "snappy" => Ok(Compression::Snappy),
        "zstd" => Ok(Compression::Zstd),
        other => bail!("unknown compression: {other:?}"),
    }
}

/// Parses `FIRST:LAST` into an inclusive year range.
pub fn parse_year_range(s: &str) -> Result<RangeInclusive<i32>> {
    let (lo, hi) = parse_bounds(s)?;
    let lo = i32::try_from(lo).with_context(|| format!("year out of range in {s:?}"))?;
    let hi = i32::try_from(hi).with_context(|| format!("year out of range in {s:?}"))?;
    Ok(lo..=hi)
}

/// Parses `KEY=LO:HI` into a [`RangeFilter`].
pub fn parse_filter(s: &str) -> Result<RangeFilter> {
    let Some((key, bounds)) = s.split_once('=') else {
        bail!("filter must look like KEY=LO:HI, got {s:?}");
    };
    let (lo, hi) = parse_bounds(bounds)?;
    Ok(RangeFilter::new(key.trim(), lo, hi))
}

/// Parses `IN=OUT` into a pair of paths.
pub fn parse_apply(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((input, output)) if !input.is_empty() && !output.is_empty() => {
            Ok((input.to_string(), output.to_string()))
        }
        _ => bail!("apply target must look like IN=OUT, got {s:?}"),
    }
}

fn parse_bounds(s: &str) -> Result<(i64, i64)> {
    let Some((lo, hi)) = s.split_once(':') else {
        bail!("range must look like LO:HI, got {s:?}");
    };
    let lo = lo
        .trim()
        .parse()
        .with_context(|| format!("invalid lower bound in {s:?}"))?;
    let hi = hi
        .trim()
        .parse()
        .with_context(|| format!("invalid upper bound in {s:?}"))?;
    if lo > hi {
        bail!("range {s:?} has lower bound above upper bound");
    }
    Ok((lo, hi))
}

/// Builds an [`SpiConfig`] from the TOML SPI configuration.
pub fn build_spi_config(spi: &SpiToml) -> Result<SpiConfig> {
    let cfg = SpiConfig::new()
        .with_min_precip(spi.min_precip)
        .with_zero_max(spi.zero_max)
        .with_max_shape(spi.max_shape)
        .with_prob_bounds(spi.prob_floor, spi.prob_ceil)
        .with_max_chunk(spi.max_chunk);
    cfg.validate().context("invalid [spi] configuration")?;
    Ok(cfg)
}

/// Builds a [`WriterConfig`] from the TOML I/O configuration.
pub fn build_writer_config(io: &IoToml) -> Result<WriterConfig> {
    let compression = parse_compression(&io.compression)?;
    let cfg = WriterConfig::default()
        .with_compression(compression)
        .with_missing_value(io.missing_value)
        .with_bitmap(io.bitmap)
        .with_row_group_size(io.row_group_size);
    cfg.validate().context("invalid [io] configuration")?;
    Ok(cfg)
}

/// Builds a [`BiasConfig`] from the TOML bias configuration.
pub fn build_bias_config(bias: &BiasToml) -> Result<BiasConfig> {
    let cfg = BiasConfig::new()
        .with_floor(bias.floor)
        .with_factor_bounds(bias.min_factor, bias.max_factor);
    cfg.validate().context("invalid [bias] configuration")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_names() {
        assert_eq!(parse_compression("ZSTD").unwrap(), Compression::Zstd);
        assert_eq!(parse_compression("none").unwrap(), Compression::None);
        assert!(parse_compression("lz4").is_err());
    }

    #[test]
    fn year_range() {
        assert_eq!(parse_year_range("1991:2020").unwrap(), 1991..=2020);
        assert!(parse_year_range("2020:1991").is_err());
        assert!(parse_year_range("1991").is_err());
        assert!(parse_year_range("a:b").is_err());
    }

    #[test]
    fn filter_strings() {
        let f = parse_filter("year=1993:2016").unwrap();
        assert_eq!((f.key(), f.lo(), f.hi()), ("year", 1993, 2016));
        assert!(parse_filter("year1993:2016").is_err());
    }

    #[test]
    fn apply_pairs() {
        let (i, o) = parse_apply("ens.parquet=ens_bc.parquet").unwrap();
        assert_eq!((i.as_str(), o.as_str()), ("ens.parquet", "ens_bc.parquet"));
        assert!(parse_apply("=out").is_err());
        assert!(parse_apply("in").is_err());
    }

    #[test]
    fn defaults_build() {
        let cfg = SpidiConfig::default();
        assert!(build_spi_config(&cfg.spi).is_ok());
        assert!(build_writer_config(&cfg.io).is_ok());
        assert!(build_bias_config(&cfg.bias).is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let spi = SpiToml {
            zero_max: 1.5,
            ..SpiToml::default()
        };
        assert!(build_spi_config(&spi).is_err());
        let io = IoToml {
            compression: "brotli".to_string(),
            ..IoToml::default()
        };
        assert!(build_writer_config(&io).is_err());
    }
}
