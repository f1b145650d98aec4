//! Run configuration

use pixe_filetypes::MetadataFields;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;
use thiserror::Error;

/// What happens to the source once the destination is in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transfer {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One file after another, results in discovery order
    Sequential,
    /// A fixed-size worker pool, results in completion order
    Concurrent { workers: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Concurrent {
            workers: default_workers(),
        }
    }
}

/// Worker count used when none is configured
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub dest_root: PathBuf,
    pub transfer: Transfer,
    pub recurse: bool,
    pub execution: ExecutionMode,
    /// Metadata applied to every placed file
    pub tags: MetadataFields,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            dest_root: PathBuf::from("."),
            transfer: Transfer::default(),
            recurse: false,
            execution: ExecutionMode::default(),
            tags: MetadataFields::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("metadata tag keys must not be empty")]
    EmptyTagKey,
}

impl PlacementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ExecutionMode::Concurrent { workers: 0 } = self.execution {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.tags.keys().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::EmptyTagKey);
        }
        Ok(())
    }
}
