//! Placement pipeline for Pixe
//!
//! Turns a (digest, capture date) pair into a date-partitioned destination,
//! quarantines files whose destination already exists, and drives whole
//! source trees through that pipeline sequentially or on a worker pool.
//!
//! ```text
//! <dest>/<YYYY>/<MM-Mon>/<YYYYMMDD_HHMMSS>_<sha1>.<ext>
//! <dest>/dups/<run start YYYYMMDD_HHMMSS>/<YYYY>/<MM-Mon>/<same name>
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod engine;
pub mod outcome;
pub mod plan;

pub use batch::{BatchDriver, BatchError, BatchReport};
pub use config::{default_workers, ConfigError, ExecutionMode, PlacementConfig, Transfer};
pub use context::RunContext;
pub use engine::PlacementEngine;
pub use outcome::{OutcomeRecord, Placement, PlacementFailure, PlacementOutcome};
pub use plan::{date_dir, target_name, DestinationPlan};
