//! Holocene CLI Binary
//!
//! Command-line interface for Holocene data directories.

use anyhow::Context;
use clap::Parser;
use holocene::config::ConfigLoader;
use holocene::logging::init_logging;
use holocene::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Error loading configuration")?;

    cli.apply_logging_overrides(&mut config.logging);
    init_logging(Some(&config.logging)).context("Error initializing logging")?;

    let context = CliContext::from_config(config, cli.datadir.clone())
        .context("Error initializing data directory")?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
