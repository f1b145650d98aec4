//! The capability set every file-type variant implements

use crate::error::{PixeError, Result};
use chrono::NaiveDateTime;
use sha1::{Digest as Sha1Digest, Sha1};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Chunk size used when feeding a re-encoded pixel stream to the hasher
pub const CHECKSUM_BLOCK_SIZE: usize = 8192;

/// Requested metadata mutations, keyed by whitelist name
pub type MetadataFields = BTreeMap<String, String>;

/// Lower-case hex SHA-1 of a pixel stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A handler bound to one file path.
///
/// Handlers are created per file by the [`crate::Registry`] and are never
/// shared between workers.
pub trait TypeHandler: Send {
    /// Short variant name used in error messages
    fn name(&self) -> &'static str;

    /// The file this handler operates on
    fn path(&self) -> &Path;

    /// Metadata keys callers may mutate through [`TypeHandler::set_metadata`]
    fn allowed_metadata_keys(&self) -> &'static [&'static str];

    /// Digest of the decoded pixel data only. Container metadata never
    /// contributes to the result.
    fn checksum(&self) -> Result<Digest>;

    /// Original capture time, or [`crate::sentinel_date`] when the file
    /// carries none.
    fn capture_date(&self) -> Result<NaiveDateTime>;

    /// Apply whitelisted metadata in place.
    ///
    /// Every key is validated before anything is written, so a rejected call
    /// leaves the file untouched. Empty values are skipped.
    fn set_metadata(&self, fields: &MetadataFields) -> Result<()>;
}

/// Hash a byte stream in [`CHECKSUM_BLOCK_SIZE`] chunks
pub fn digest_stream<R: Read>(mut reader: R) -> std::io::Result<Digest> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; CHECKSUM_BLOCK_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(Digest::from_bytes(&hasher.finalize()))
}

/// Fail with `DisallowedTag` on the first key outside `allowed`
pub fn check_allowed_keys(
    handler: &'static str,
    allowed: &'static [&'static str],
    fields: &MetadataFields,
) -> Result<()> {
    match fields.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(PixeError::DisallowedTag {
            key: key.clone(),
            handler,
            allowed: allowed.to_vec(),
        }),
        None => Ok(()),
    }
}
