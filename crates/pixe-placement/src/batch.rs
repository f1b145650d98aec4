//! Discovery and dispatch of a whole source tree

use crate::config::{ConfigError, ExecutionMode, PlacementConfig};
use crate::context::RunContext;
use crate::engine::PlacementEngine;
use crate::outcome::PlacementOutcome;
use pixe_filetypes::{FileHandle, Registry};
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Failures that stop a batch before any file is processed
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid source {}: {reason}", path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("failed to scan source directory: {0}")]
    Discovery(#[from] walkdir::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] ThreadPoolBuildError),
}

impl BatchError {
    /// Whether this is a bad top-level parameter rather than a setup failure
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            BatchError::InvalidSource { .. } | BatchError::InvalidConfig(_)
        )
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub placed: usize,
    pub quarantined: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.placed + self.failed
    }

    /// Count one outcome. Quarantined files are also counted as placed.
    pub fn record(&mut self, outcome: &PlacementOutcome) {
        if outcome.is_success() {
            self.placed += 1;
        } else {
            self.failed += 1;
        }
        if outcome.is_quarantined() {
            self.quarantined += 1;
        }
    }
}

pub struct BatchDriver<'a> {
    registry: &'a Registry,
    config: &'a PlacementConfig,
}

impl<'a> BatchDriver<'a> {
    pub fn new(registry: &'a Registry, config: &'a PlacementConfig) -> Self {
        Self { registry, config }
    }

    /// Collect candidate files under `source`.
    ///
    /// A single file is returned as-is regardless of its extension. For a
    /// directory only regular files with a registered extension are kept,
    /// sorted by name within each directory.
    pub fn discover(&self, source: &Path) -> Result<Vec<FileHandle>, BatchError> {
        let metadata = fs::metadata(source).map_err(|e| BatchError::InvalidSource {
            path: source.to_path_buf(),
            reason: match e.kind() {
                io::ErrorKind::NotFound => "does not exist".to_string(),
                _ => e.to_string(),
            },
        })?;

        if metadata.is_file() {
            return Ok(vec![FileHandle::new(source)]);
        }
        if !metadata.is_dir() {
            return Err(BatchError::InvalidSource {
                path: source.to_path_buf(),
                reason: "neither a file nor a directory".to_string(),
            });
        }

        let max_depth = if self.config.recurse { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(source)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(BatchError::Discovery(e)),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.registry.supports(entry.path()) {
                files.push(FileHandle::new(entry.into_path()));
            }
        }

        Ok(files)
    }

    /// Place every file under the context's source, calling `on_result` on
    /// the calling thread as each file completes.
    pub fn run<F>(&self, context: &RunContext, mut on_result: F) -> Result<BatchReport, BatchError>
    where
        F: FnMut(PlacementOutcome),
    {
        self.config.validate()?;
        let files = self.discover(context.source())?;

        info!(
            "Processing {} file(s) from {} into {}",
            files.len(),
            context.source().display(),
            context.dest_root().display()
        );

        let engine = PlacementEngine::new(self.registry, context, self.config);
        let started = Instant::now();
        let mut report = BatchReport::default();
        let mut record = |outcome: PlacementOutcome| {
            report.record(&outcome);
            on_result(outcome);
        };

        match self.config.execution {
            ExecutionMode::Sequential => {
                for file in files {
                    record(engine.place(file));
                }
            }
            ExecutionMode::Concurrent { workers } => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|index| format!("pixe-worker-{}", index))
                    .build()?;
                let (tx, rx) = mpsc::channel();
                let engine = &engine;

                thread::scope(|scope| {
                    scope.spawn(move || {
                        pool.install(|| {
                            files.into_par_iter().for_each_with(tx, |tx, file| {
                                // the receiver outlives every worker
                                let _ = tx.send(engine.place(file));
                            });
                        });
                    });

                    for outcome in rx {
                        record(outcome);
                    }
                });
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Placed {} file(s) ({} quarantined), {} failed in {:.2?}",
            report.placed, report.quarantined, report.failed, report.elapsed
        );

        Ok(report)
    }
}
