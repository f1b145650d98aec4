//! Per-file results

use pixe_filetypes::{ErrorKind, PixeError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A file that reached its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub quarantined: bool,
}

/// A file that failed at some step.
///
/// `destination` is set when the failure happened after the file was placed
/// (a rejected or failed metadata write).
#[derive(Debug)]
pub struct PlacementFailure {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub quarantined: bool,
    pub error: PixeError,
}

#[derive(Debug)]
pub enum PlacementOutcome {
    Placed(Placement),
    Failed(PlacementFailure),
}

impl PlacementOutcome {
    pub fn source(&self) -> &Path {
        match self {
            PlacementOutcome::Placed(placement) => &placement.source,
            PlacementOutcome::Failed(failure) => &failure.source,
        }
    }

    /// Where the file ended up, if it was written at all
    pub fn destination(&self) -> Option<&Path> {
        match self {
            PlacementOutcome::Placed(placement) => Some(&placement.destination),
            PlacementOutcome::Failed(failure) => failure.destination.as_deref(),
        }
    }

    pub fn is_quarantined(&self) -> bool {
        match self {
            PlacementOutcome::Placed(placement) => placement.quarantined,
            PlacementOutcome::Failed(failure) => failure.quarantined,
        }
    }

    pub fn error(&self) -> Option<&PixeError> {
        match self {
            PlacementOutcome::Placed(_) => None,
            PlacementOutcome::Failed(failure) => Some(&failure.error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PlacementOutcome::Placed(_))
    }

    pub fn to_record(&self) -> OutcomeRecord {
        OutcomeRecord {
            source: self.source().to_path_buf(),
            destination: self.destination().map(Path::to_path_buf),
            quarantined: self.is_quarantined(),
            error_kind: self.error().map(PixeError::kind),
            error: self.error().map(ToString::to_string),
        }
    }
}

/// `<source> -> <destination>` or `<source> -> FAILED [<kind>] <message>`.
///
/// A failure after placement ends with `(placed at <destination>)`.
impl fmt::Display for PlacementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementOutcome::Placed(placement) => write!(
                f,
                "{} -> {}",
                placement.source.display(),
                placement.destination.display()
            ),
            PlacementOutcome::Failed(failure) => {
                write!(
                    f,
                    "{} -> FAILED [{}] {}",
                    failure.source.display(),
                    failure.error.kind(),
                    failure.error
                )?;
                if let Some(destination) = &failure.destination {
                    write!(f, " (placed at {})", destination.display())?;
                }
                Ok(())
            }
        }
    }
}

/// Serializable form of a [`PlacementOutcome`] for JSON-lines output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub quarantined: bool,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}
