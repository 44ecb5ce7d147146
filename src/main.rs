mod bias_cmd;
mod cli;
mod climatology_cmd;
mod config;
mod convert;
mod forecast_cmd;
mod logging;
mod spi_cmd;

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::SpidiConfig;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command, cli.config.as_deref()) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Command, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    match command {
        Command::SpiMonthly(args) => spi_cmd::run(args, &config),
        Command::SpiForecast(args) => forecast_cmd::run(args, &config),
        Command::Climatology(args) => climatology_cmd::run(args, &config),
        Command::BiasCorrect(args) => bias_cmd::run(args, &config),
    }
}

/// Reads the TOML configuration, or returns defaults when no file is given.
fn load_config(path: Option<&Path>) -> Result<SpidiConfig> {
    let Some(path) = path else {
        return Ok(SpidiConfig::default());
    };
    let toml_str = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&toml_str).context("failed to parse TOML config")
}
