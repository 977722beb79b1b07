use anyhow::{Context, Result};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;

use super::iptc::{Iptc, PHOTOSHOP_HEADER};
use super::tiff::Tiff;
use super::values::ExifValues;

pub(crate) const APP13: u8 = 0xED;

/// The metadata blocks of one JPEG: the EXIF values as stored, plus the
/// EXIF and IPTC blocks ready for editing.
#[derive(Debug, Clone)]
pub struct EmbeddedMetadata {
    pub values: ExifValues,
    pub exif: Tiff,
    pub iptc: Iptc,
}

impl Default for EmbeddedMetadata {
    fn default() -> Self {
        Self { values: ExifValues::default(), exif: Tiff::empty(), iptc: Iptc::default() }
    }
}

impl EmbeddedMetadata {
    pub fn is_modified(&self) -> bool {
        self.exif.is_modified() || self.iptc.is_modified()
    }
}

/// Read the EXIF and IPTC blocks of a JPEG file. Missing blocks come back empty.
pub fn read_embedded(path: &Path) -> Result<EmbeddedMetadata> {
    let file_bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image file {}", path.display()))?;
    let jpeg = Jpeg::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG {}: {e}", path.display()))?;
    let (exif, iptc) = blocks(&jpeg).with_context(|| format!("Unreadable metadata in {}", path.display()))?;
    Ok(EmbeddedMetadata { values: ExifValues::read(path), exif, iptc })
}

fn blocks(jpeg: &Jpeg) -> Result<(Tiff, Iptc)> {
    let exif = match jpeg.exif() {
        Some(tiff) if !tiff.is_empty() => Tiff::parse(tiff.to_vec()).context("Failed to parse EXIF block")?,
        _ => {
            log::debug!("No EXIF block found");
            Tiff::empty()
        }
    };

    let iptc = find_app13_pos(jpeg)
        .map(|pos| Iptc::from_app13(jpeg.segments()[pos].contents()))
        .unwrap_or_default();

    Ok((exif, iptc))
}

/// Position of the Photoshop APP13 segment that carries IPTC.
pub(crate) fn find_app13_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == APP13 && s.contents().starts_with(PHOTOSHOP_HEADER))
}
