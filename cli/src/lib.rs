//! Command-line front end for Pixe

pub mod args;
pub mod logging;

pub use args::{parse_tag, Cli};
pub use logging::{init_logging, LogFormat};

use anyhow::{Context, Result};
use pixe_filetypes::{ErrorKind, ExiftoolWriter, Registry};
use pixe_placement::{BatchDriver, PlacementOutcome, RunContext};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, warn};

/// How a run ended, short of a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The source was processed; individual files may still have failed
    Completed,
    /// The source path was missing or unusable
    InvalidParameter,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::InvalidParameter => 2,
        }
    }
}

/// Run one import, writing a result line per file to `out`
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<RunStatus> {
    let config = cli.placement_config();

    let writer = ExiftoolWriter::new();
    if !config.tags.is_empty() && !writer.is_available() {
        warn!("exiftool not found on PATH, metadata writes will fail");
    }
    let registry = Registry::with_defaults(Arc::new(writer));
    let context = RunContext::new(&cli.source, &config.dest_root);

    let mut write_error = None;
    let result = BatchDriver::new(&registry, &config).run(&context, |outcome| {
        if write_error.is_none() {
            if let Err(e) = write_outcome(&mut *out, &outcome, cli.json) {
                write_error = Some(e);
            }
        }
    });

    if let Some(e) = write_error {
        return Err(e).context("Failed to write results");
    }

    match result {
        Ok(_) => Ok(RunStatus::Completed),
        Err(e) if e.is_parameter_error() => {
            error!("[{}] {}", ErrorKind::Parameter, e);
            Ok(RunStatus::InvalidParameter)
        }
        Err(e) => Err(e).context("Import failed"),
    }
}

fn write_outcome(out: &mut dyn Write, outcome: &PlacementOutcome, json: bool) -> io::Result<()> {
    if json {
        let line = serde_json::to_string(&outcome.to_record())?;
        writeln!(out, "{}", line)
    } else {
        writeln!(out, "{}", outcome)
    }
}
