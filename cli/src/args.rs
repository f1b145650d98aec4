use crate::logging::LogFormat;
use clap::{ArgAction, Parser};
use pixe_filetypes::MetadataFields;
use pixe_placement::{default_workers, ExecutionMode, PlacementConfig, Transfer};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pixe")]
#[command(about = "Import photos into a date-partitioned, deduplicated archive")]
#[command(version)]
pub struct Cli {
    /// File or directory to import
    pub source: PathBuf,

    /// Destination root of the archive
    #[arg(short, long, env = "PIXE_DEST", default_value = ".")]
    pub dest: PathBuf,

    /// Descend into subdirectories of the source
    #[arg(short, long)]
    pub recurse: bool,

    /// Process files on a worker pool (default)
    #[arg(long, overrides_with = "serial")]
    pub parallel: bool,

    /// Process files one at a time, in discovery order
    #[arg(long, overrides_with = "parallel")]
    pub serial: bool,

    /// Remove each source file once it is in place
    #[arg(long = "move", visible_alias = "mv", overrides_with = "copy")]
    pub move_files: bool,

    /// Leave source files untouched (default)
    #[arg(long, visible_alias = "cp", overrides_with = "move_files")]
    pub copy: bool,

    /// Owner name written to every placed file
    #[arg(long)]
    pub owner: Option<String>,

    /// Extra metadata to write, may be repeated
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,

    /// Worker count for parallel mode
    #[arg(short, long, env = "PIXE_JOBS")]
    pub jobs: Option<usize>,

    /// Print one JSON object per file instead of text lines
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn placement_config(&self) -> PlacementConfig {
        let execution = if self.serial {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Concurrent {
                workers: self.jobs.unwrap_or_else(default_workers),
            }
        };

        let mut tags: MetadataFields = self.tags.iter().cloned().collect();
        if let Some(owner) = &self.owner {
            tags.insert("owner".to_string(), owner.clone());
        }

        PlacementConfig {
            dest_root: self.dest.clone(),
            transfer: if self.move_files {
                Transfer::Move
            } else {
                Transfer::Copy
            },
            recurse: self.recurse,
            execution,
            tags,
        }
    }
}

/// Parse `KEY=VALUE`; the value may be empty
pub fn parse_tag(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
