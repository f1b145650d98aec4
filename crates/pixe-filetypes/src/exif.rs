//! EXIF capture dates and tag writing
//!
//! Capture dates are read in-process with `rexif`. Tags are written by
//! shelling out to exiftool, which updates the metadata block in place and
//! leaves the compressed image data untouched.

use crate::error::{PixeError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rexif::{ExifError, ExifTag, TagValue};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Pattern of the EXIF `DateTimeOriginal` tag
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Placeholder capture time for files without a usable `DateTimeOriginal`.
///
/// Predates digital photography, so it never collides with a real capture.
pub fn sentinel_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1902, 2, 20)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Parse an EXIF datetime string, tolerating the trailing NULs some cameras write
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_FORMAT).ok()
}

/// Read `DateTimeOriginal` from a file.
///
/// A missing or malformed tag, or a missing EXIF block, yields
/// [`sentinel_date`]. Failing to read the file, or content that is not a
/// recognizable image container, is an error.
pub fn read_capture_date(path: &Path) -> Result<NaiveDateTime> {
    let bytes = fs::read(path).map_err(|e| PixeError::io("read", path, e))?;

    let exif = match rexif::parse_buffer_quiet(&bytes).0 {
        Ok(exif) => exif,
        Err(ExifError::IoError(e)) => return Err(PixeError::io("read exif", path, e)),
        Err(ExifError::FileTypeUnknown) => {
            return Err(PixeError::decode(path, "not a recognizable image container"))
        }
        Err(e) => {
            debug!("No EXIF data in {}: {}", path.display(), e);
            return Ok(sentinel_date());
        }
    };

    let original = exif.entries.iter().find_map(|entry| match (&entry.tag, &entry.value) {
        (ExifTag::DateTimeOriginal, TagValue::Ascii(raw)) => Some(raw.as_str()),
        _ => None,
    });

    match original.and_then(parse_exif_datetime) {
        Some(date) => Ok(date),
        None => {
            debug!(
                "No usable DateTimeOriginal in {} ({:?}), using sentinel date",
                path.display(),
                original
            );
            Ok(sentinel_date())
        }
    }
}

/// Writes named EXIF tags into a file in place
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, path: &Path, tags: &[(&'static str, String)]) -> Result<()>;
}

/// [`TagWriter`] backed by the `exiftool` executable
#[derive(Debug, Clone)]
pub struct ExiftoolWriter {
    program: PathBuf,
}

impl ExiftoolWriter {
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the configured program can be found on `PATH`
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

impl Default for ExiftoolWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TagWriter for ExiftoolWriter {
    fn write_tags(&self, path: &Path, tags: &[(&'static str, String)]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut command = Command::new(&self.program);
        command.arg("-P").arg("-overwrite_original");
        for (tag, value) in tags {
            command.arg(format!("-{}={}", tag, value));
        }
        command.arg(path);

        let output = command.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PixeError::metadata(
                path,
                format!("{} not found on PATH", self.program.display()),
            ),
            _ => PixeError::metadata(
                path,
                format!("failed to run {}: {}", self.program.display(), e),
            ),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PixeError::metadata(
                path,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        debug!("Wrote {} tag(s) to {}", tags.len(), path.display());
        Ok(())
    }
}
