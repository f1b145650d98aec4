//! Deterministic fixtures for Pixe tests
//!
//! Fixture JPEGs are solid-color images encoded by the `image` crate, with an
//! optional hand-built EXIF APP1 segment spliced in after the SOI marker.
//! Two fixtures with the same color therefore share pixel data even when
//! their EXIF blocks differ.

use anyhow::{ensure, Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fixture edge length in pixels
pub const FIXTURE_SIZE: u32 = 16;

/// EXIF content to embed in a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exif<'a> {
    /// No APP1 segment at all
    None,
    /// An APP1 segment whose Exif IFD has no entries
    Empty,
    /// `DateTimeOriginal` set to the given raw string
    DateTimeOriginal(&'a str),
    /// An APP1 segment whose IFD0 entry table runs past the end of the data
    Truncated,
}

/// Encode a solid-color JPEG in memory
pub fn solid_jpeg(color: [u8; 3], exif: Exif<'_>) -> Result<Vec<u8>> {
    let pixels = RgbImage::from_pixel(FIXTURE_SIZE, FIXTURE_SIZE, Rgb(color));
    let image = DynamicImage::ImageRgb8(pixels);
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Jpeg)
        .context("Failed to encode fixture JPEG")?;
    let jpeg = cursor.into_inner();

    ensure!(jpeg.starts_with(&[0xFF, 0xD8]), "encoder did not emit an SOI marker");

    let segment = match exif {
        Exif::None => return Ok(jpeg),
        Exif::Empty => exif_segment(None),
        Exif::DateTimeOriginal(raw) => exif_segment(Some(raw)),
        Exif::Truncated => truncated_exif_segment(),
    };

    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Write a solid-color JPEG to `path`, creating parent directories
pub fn write_solid_jpeg(path: &Path, color: [u8; 3], exif: Exif<'_>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let bytes = solid_jpeg(color, exif)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Build a big-endian APP1 segment holding IFD0 -> Exif IFD -> DateTimeOriginal
pub fn exif_segment(date_time_original: Option<&str>) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM");
    tiff.extend_from_slice(&0x002Au16.to_be_bytes());
    tiff.extend_from_slice(&8u32.to_be_bytes());

    // IFD0 at 8: a single ExifOffset pointer to 26
    tiff.extend_from_slice(&1u16.to_be_bytes());
    push_entry(&mut tiff, 0x8769, 4, 1, 26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());

    // Exif IFD at 26
    match date_time_original {
        Some(raw) => {
            let mut value = raw.as_bytes().to_vec();
            value.push(0);
            let count = value.len() as u32;

            tiff.extend_from_slice(&1u16.to_be_bytes());
            if value.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..value.len()].copy_from_slice(&value);
                push_entry(&mut tiff, 0x9003, 2, count, inline);
                tiff.extend_from_slice(&0u32.to_be_bytes());
            } else {
                push_entry(&mut tiff, 0x9003, 2, count, 44u32.to_be_bytes());
                tiff.extend_from_slice(&0u32.to_be_bytes());
                tiff.extend_from_slice(&value);
            }
        }
        None => {
            tiff.extend_from_slice(&0u16.to_be_bytes());
            tiff.extend_from_slice(&0u32.to_be_bytes());
        }
    }

    app1(&tiff)
}

/// Build an APP1 segment whose IFD0 claims more entries than it holds.
///
/// The segment length is consistent, so JPEG parsing reaches the EXIF block
/// and only the TIFF structure inside it is broken.
pub fn truncated_exif_segment() -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM");
    tiff.extend_from_slice(&0x002Au16.to_be_bytes());
    tiff.extend_from_slice(&8u32.to_be_bytes());

    // 12 entries announced, one present, pointing far past the end
    tiff.extend_from_slice(&12u16.to_be_bytes());
    push_entry(&mut tiff, 0x8769, 4, 1, 0x0000_FFF0u32.to_be_bytes());

    app1(&tiff)
}

fn app1(tiff: &[u8]) -> Vec<u8> {
    let length = (2 + 6 + tiff.len()) as u16;
    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(tiff);
    segment
}

fn push_entry(tiff: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
    tiff.extend_from_slice(&tag.to_be_bytes());
    tiff.extend_from_slice(&kind.to_be_bytes());
    tiff.extend_from_slice(&count.to_be_bytes());
    tiff.extend_from_slice(&value);
}

/// Whether the real exiftool binary is installed
pub fn exiftool_available() -> bool {
    which::which("exiftool").is_ok()
}

/// Every regular file under `root`, keyed by path relative to `root`
pub fn tree_snapshot(root: &Path) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut snapshot = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?.to_path_buf();
        let contents = fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        snapshot.insert(relative, contents);
    }
    Ok(snapshot)
}

/// Relative paths of every regular file under `root`, sorted
pub fn tree_paths(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(tree_snapshot(root)?.into_keys().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exif_segment_layout() {
        let segment = exif_segment(Some("2020:03:21 03:13:12"));
        assert_eq!(&segment[..2], &[0xFF, 0xE1]);
        assert_eq!(&segment[4..10], b"Exif\0\0");

        let length = u16::from_be_bytes([segment[2], segment[3]]) as usize;
        assert_eq!(length, segment.len() - 2);

        let tiff = &segment[10..];
        assert_eq!(&tiff[44..63], b"2020:03:21 03:13:12");
        assert_eq!(tiff[63], 0);
    }

    #[test]
    fn test_truncated_segment_is_self_consistent() {
        let segment = truncated_exif_segment();
        let length = u16::from_be_bytes([segment[2], segment[3]]) as usize;
        assert_eq!(length, segment.len() - 2);

        let tiff = &segment[10..];
        let announced = u16::from_be_bytes([tiff[8], tiff[9]]) as usize;
        assert!(10 + announced * 12 > tiff.len());
    }

    #[test]
    fn test_solid_jpeg_variants_share_pixels() -> Result<()> {
        let plain = solid_jpeg([1, 2, 3], Exif::None)?;
        let dated = solid_jpeg([1, 2, 3], Exif::DateTimeOriginal("2020:03:21 03:13:12"))?;

        assert!(dated.len() > plain.len());
        assert_eq!(&dated[dated.len() - (plain.len() - 2)..], &plain[2..]);

        let decoded_plain = image::load_from_memory(&plain)?;
        let decoded_dated = image::load_from_memory(&dated)?;
        assert_eq!(decoded_plain.as_bytes(), decoded_dated.as_bytes());
        Ok(())
    }
}
