//! Still-image handler (JPEG)
//!
//! The checksum decodes the file with the `image` crate and re-encodes the
//! pixels with the same codec. The encoder emits no EXIF block, so tag edits
//! made later never change the digest.

use crate::error::{PixeError, Result};
use crate::exif::{read_capture_date, TagWriter};
use crate::handler::{check_allowed_keys, digest_stream, Digest, MetadataFields, TypeHandler};
use crate::registry::Registry;
use chrono::NaiveDateTime;
use image::ImageReader;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct ImageFile {
    path: PathBuf,
    writer: Arc<dyn TagWriter>,
}

impl ImageFile {
    pub const NAME: &'static str = "ImageFile";
    /// Only codecs the `image` crate can decode and re-encode are listed, so
    /// HEIC/HEIF are absent. Other formats get their own [`TypeHandler`] added
    /// through [`Registry::register`].
    pub const EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg"];
    pub const ALLOWED_TAGS: &'static [&'static str] = &["owner"];

    pub fn new(path: impl Into<PathBuf>, writer: Arc<dyn TagWriter>) -> Self {
        Self {
            path: path.into(),
            writer,
        }
    }

    /// Register the image handler for all of its extensions
    pub fn register(registry: &mut Registry, writer: Arc<dyn TagWriter>) {
        registry.register(Self::EXTENSIONS, move |path: &Path| {
            Box::new(ImageFile::new(path, Arc::clone(&writer))) as Box<dyn TypeHandler>
        });
    }

    /// EXIF tag that stores a whitelisted key
    fn exif_tag(key: &str) -> Option<&'static str> {
        match key {
            "owner" => Some("OwnerName"),
            _ => None,
        }
    }
}

impl TypeHandler for ImageFile {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn allowed_metadata_keys(&self) -> &'static [&'static str] {
        Self::ALLOWED_TAGS
    }

    fn checksum(&self) -> Result<Digest> {
        let reader = ImageReader::open(&self.path)
            .map_err(|e| PixeError::io("open", &self.path, e))?
            .with_guessed_format()
            .map_err(|e| PixeError::io("read", &self.path, e))?;

        let format = reader
            .format()
            .ok_or_else(|| PixeError::decode(&self.path, "unrecognized image format"))?;
        let image = reader
            .decode()
            .map_err(|e| PixeError::decode(&self.path, e))?;

        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, format)
            .map_err(|e| PixeError::decode(&self.path, format!("re-encode failed: {}", e)))?;
        encoded.set_position(0);

        let digest = digest_stream(encoded).map_err(|e| PixeError::io("hash", &self.path, e))?;
        debug!("Pixel digest for {}: {}", self.path.display(), digest);
        Ok(digest)
    }

    fn capture_date(&self) -> Result<NaiveDateTime> {
        read_capture_date(&self.path)
    }

    fn set_metadata(&self, fields: &MetadataFields) -> Result<()> {
        check_allowed_keys(Self::NAME, Self::ALLOWED_TAGS, fields)?;

        let tags: Vec<(&'static str, String)> = fields
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(key, value)| Self::exif_tag(key).map(|tag| (tag, value.clone())))
            .collect();

        if tags.is_empty() {
            return Ok(());
        }

        self.writer.write_tags(&self.path, &tags)
    }
}
