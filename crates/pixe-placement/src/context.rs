use chrono::{Local, NaiveDateTime, Timelike};
use std::path::{Path, PathBuf};

use crate::plan::TIMESTAMP_FORMAT;

/// Name of the quarantine directory under the destination root
pub const DUPS_DIR: &str = "dups";

/// Read-only facts about one invocation.
///
/// The start time is captured once and only names the quarantine subtree, so
/// every duplicate found during a run lands under the same directory no
/// matter which worker found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    started_at: NaiveDateTime,
    source: PathBuf,
    dest_root: PathBuf,
}

impl RunContext {
    pub fn new(source: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        let now = Local::now().naive_local();
        Self::with_start_time(source, dest_root, now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn with_start_time(
        source: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
        started_at: NaiveDateTime,
    ) -> Self {
        Self {
            started_at,
            source: source.into(),
            dest_root: dest_root.into(),
        }
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// `<dest>/dups/<run start>`
    pub fn quarantine_root(&self) -> PathBuf {
        self.dest_root
            .join(DUPS_DIR)
            .join(self.started_at.format(TIMESTAMP_FORMAT).to_string())
    }
}
