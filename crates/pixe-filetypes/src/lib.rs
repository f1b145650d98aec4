//! File classification and identity for Pixe
//!
//! This crate maps file extensions to type handlers through an explicit
//! [`Registry`]. Each handler knows how to compute a pixel-only checksum,
//! read the capture date from format-specific metadata, and apply a
//! whitelisted set of metadata mutations.

pub mod error;
pub mod exif;
pub mod handler;
pub mod image_file;
pub mod registry;

pub use error::{ErrorKind, PixeError, Result};
pub use exif::{sentinel_date, ExiftoolWriter, TagWriter};
pub use handler::{Digest, MetadataFields, TypeHandler, CHECKSUM_BLOCK_SIZE};
pub use image_file::ImageFile;
pub use registry::{HandlerConstructor, Registry};

use std::path::{Path, PathBuf};

/// A candidate file and its normalized extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    extension: String,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(normalize_extension)
            .unwrap_or_default();

        Self { path, extension }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased extension without the leading dot, empty when the file has none
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Lower-case an extension and strip any leading dots
pub fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}
