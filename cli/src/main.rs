use anyhow::{Context, Result};
use clap::Parser;
use pixe::{init_logging, run, Cli};
use std::io;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format).context("Failed to initialize logging")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let status = run(&cli, &mut out)?;

    Ok(ExitCode::from(status.code()))
}
