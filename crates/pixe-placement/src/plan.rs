//! Destination naming and collision redirection

use crate::context::RunContext;
use chrono::NaiveDateTime;
use pixe_filetypes::Digest;
use std::path::{Path, PathBuf};

/// Timestamp layout shared by file names and quarantine directories
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Month directory layout, e.g. `03-Mar`
pub const MONTH_DIR_FORMAT: &str = "%m-%b";

/// `<YYYY>/<MM-Mon>`
pub fn date_dir(date: &NaiveDateTime) -> PathBuf {
    PathBuf::from(date.format("%Y").to_string()).join(date.format(MONTH_DIR_FORMAT).to_string())
}

/// `<YYYYMMDD_HHMMSS>_<digest>.<ext>`; `extension` must already be normalized
pub fn target_name(date: &NaiveDateTime, digest: &Digest, extension: &str) -> String {
    let stem = format!("{}_{}", date.format(TIMESTAMP_FORMAT), digest);
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Where one file will be written.
///
/// Built per file and consumed immediately by the materialize step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPlan {
    pub target_dir: PathBuf,
    pub target_name: String,
    pub quarantine_dir: PathBuf,
    pub collision: bool,
}

impl DestinationPlan {
    /// Plan a file and check the primary path for an existing file
    pub fn compute(
        context: &RunContext,
        date: &NaiveDateTime,
        digest: &Digest,
        extension: &str,
    ) -> Self {
        let dated = date_dir(date);
        let target_dir = context.dest_root().join(&dated);
        let target_name = target_name(date, digest, extension);
        let collision = target_dir.join(&target_name).exists();

        Self {
            target_dir,
            target_name,
            quarantine_dir: context.quarantine_root().join(dated),
            collision,
        }
    }

    /// Mark the primary path as taken
    pub fn redirect(&mut self) {
        self.collision = true;
    }

    pub fn final_dir(&self) -> &Path {
        if self.collision {
            &self.quarantine_dir
        } else {
            &self.target_dir
        }
    }

    pub fn primary_path(&self) -> PathBuf {
        self.target_dir.join(&self.target_name)
    }

    pub fn final_path(&self) -> PathBuf {
        self.final_dir().join(&self.target_name)
    }
}
