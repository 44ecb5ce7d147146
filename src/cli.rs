use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Standardized Precipitation Index and drought-monitoring tools.
#[derive(Parser)]
#[command(
    name = "spidi",
    version,
    about = "Standardized Precipitation Index and drought-monitoring tools"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to an optional TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Fit and evaluate monthly SPI over a monitoring record.
    SpiMonthly(SpiMonthlyArgs),
    /// Fit per-lead SPI parameters on a hindcast, or standardise a forecast.
    SpiForecast(SpiForecastArgs),
    /// Average a field file per value of one metadata key.
    Climatology(ClimatologyArgs),
    /// Compute multiplicative bias factors and optionally apply them.
    BiasCorrect(BiasCorrectArgs),
}

/// Arguments for the `spi-monthly` subcommand.
#[derive(clap::Args)]
pub struct SpiMonthlyArgs {
    /// Monitoring field file; every field carries `year` and `month` metadata.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving the SPI field file and the fit parameters.
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Accumulation window in months.
    #[arg(short = 'n', long)]
    pub time_scale: usize,

    /// Inclusive fit period as `FIRST:LAST` years.
    #[arg(long)]
    pub fit_years: Option<String>,

    /// Override the largest number of grid points fitted at once.
    #[arg(long)]
    pub max_chunk: Option<usize>,
}

/// Stage of the forecast SPI pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ForecastMode {
    /// Fit one parameter set per lead from hindcast years and store it.
    Fit,
    /// Load stored parameters and write the SPI of one forecast year.
    Compute,
}

/// Arguments for the `spi-forecast` subcommand.
#[derive(clap::Args)]
pub struct SpiForecastArgs {
    /// Pipeline stage to run.
    #[arg(long, value_enum)]
    pub mode: ForecastMode,

    /// Monitoring field file; every field carries `year` and `month` metadata.
    #[arg(long)]
    pub monitoring: PathBuf,

    /// Forecast field file initialised in `--init-month`; every field carries
    /// `year`, the lead key and the member key.
    #[arg(long)]
    pub forecast: PathBuf,

    /// Calendar month the forecasts were initialised in (1-12).
    #[arg(long)]
    pub init_month: u8,

    /// Accumulation window in months.
    #[arg(short = 'n', long)]
    pub time_scale: usize,

    /// Directory receiving the fit parameters or the SPI field file.
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Directory holding stored parameters in compute mode; defaults to `--output-dir`.
    #[arg(long)]
    pub params_dir: Option<PathBuf>,

    /// Inclusive hindcast period as `FIRST:LAST` years (fit mode).
    #[arg(long)]
    pub hind_years: Option<String>,

    /// Forecast year to standardise (compute mode); required when the file holds several years.
    #[arg(long)]
    pub year: Option<i32>,

    /// Override the largest number of grid points fitted at once.
    #[arg(long)]
    pub max_chunk: Option<usize>,
}

/// Arguments for the `climatology` subcommand.
#[derive(clap::Args)]
pub struct ClimatologyArgs {
    /// Input field file.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output field file, one mean field per group.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Metadata key to group by.
    #[arg(short, long, default_value = "month")]
    pub key: String,

    /// Inclusive range filter as `KEY=LO:HI`; may be repeated.
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Re-read the input once per group instead of holding every group.
    #[arg(long)]
    pub replay: bool,
}

/// Arguments for the `bias-correct` subcommand.
#[derive(clap::Args)]
pub struct BiasCorrectArgs {
    /// Observed climatology, one field per calendar `month`.
    #[arg(long)]
    pub observed: PathBuf,

    /// Hindcast climatology, one field per lead.
    #[arg(long)]
    pub hindcast: PathBuf,

    /// Calendar month the forecast was initialised in (1-12).
    #[arg(long)]
    pub init_month: u8,

    /// Output file for the factor fields.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Ensemble file to correct as `IN=OUT`; may be repeated.
    #[arg(long = "apply")]
    pub apply: Vec<String>,
}
