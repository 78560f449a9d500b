mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use qmj_core::{init_logging, LogConfig};
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    init_logging(LogConfig::new(cli.log_level.as_str()).with_format(cli.log_format.into()))
        .map_err(|error| CliError::Logging(error.to_string()))?;

    let data = commands::run(&cli)?;
    output::render(&data, cli.pretty)
}
