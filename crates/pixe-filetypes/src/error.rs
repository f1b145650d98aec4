//! Per-file error taxonomy
//!
//! Every variant describes a failure that affects a single file. Batch-level
//! failures (a bad source path, a worker pool that cannot start) live in the
//! placement crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PixeError>;

#[derive(Debug, Error)]
pub enum PixeError {
    /// No handler is registered for the file's extension
    #[error("no handler registered for extension '{extension}': {}", path.display())]
    UnsupportedType { path: PathBuf, extension: String },

    /// The file claims a supported extension but its content cannot be decoded
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// A metadata key outside the handler's whitelist was requested
    #[error("metadata key '{key}' is not allowed for {handler} (allowed: {})", allowed.join(", "))]
    DisallowedTag {
        key: String,
        handler: &'static str,
        allowed: Vec<&'static str>,
    },

    /// The metadata writer refused or failed to update the file
    #[error("failed to write metadata to {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },

    /// Copy, move, mkdir or read failures
    #[error("{operation} failed for {}: {source}", path.display())]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PixeError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: &Path, reason: impl fmt::Display) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn metadata(path: &Path, reason: impl fmt::Display) -> Self {
        Self::Metadata {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::DisallowedTag { .. } => ErrorKind::DisallowedTag,
            Self::Metadata { .. } => ErrorKind::Metadata,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
        }
    }
}

/// Stable, machine-readable name of an error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "UnsupportedType")]
    UnsupportedType,
    #[serde(rename = "DecodeError")]
    Decode,
    #[serde(rename = "DisallowedTagError")]
    DisallowedTag,
    #[serde(rename = "MetadataError")]
    Metadata,
    #[serde(rename = "FilesystemError")]
    Filesystem,
    #[serde(rename = "ParameterError")]
    Parameter,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedType => "UnsupportedType",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::DisallowedTag => "DisallowedTagError",
            ErrorKind::Metadata => "MetadataError",
            ErrorKind::Filesystem => "FilesystemError",
            ErrorKind::Parameter => "ParameterError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
