use anyhow::{Context, Result};
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;

use super::iptc::build_app13;
use super::reader::{APP13, EmbeddedMetadata, find_app13_pos};
use super::tiff::MAX_JPEG_EXIF_LEN;

/// Write modified metadata blocks back into a JPEG file.
///
/// Only blocks with pending edits are replaced; all other segments (and the
/// entropy-coded image data) are written back byte for byte. Fails without
/// touching the file if the rebuilt EXIF block no longer fits one APP1 segment.
pub fn write_embedded(path: &Path, meta: &EmbeddedMetadata) -> Result<()> {
    if !meta.is_modified() {
        log::debug!("No metadata changes for {}", path.display());
        return Ok(());
    }

    let file_bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image file {}", path.display()))?;
    let mut jpeg = Jpeg::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG {}: {e}", path.display()))?;

    if meta.exif.is_modified() {
        let tiff_data = meta.exif.to_bytes()?;
        if tiff_data.len() > MAX_JPEG_EXIF_LEN {
            anyhow::bail!(
                "EXIF block for {} is {} bytes; a JPEG APP1 segment holds at most {}",
                path.display(),
                tiff_data.len(),
                MAX_JPEG_EXIF_LEN
            );
        }
        replace_exif(&mut jpeg, tiff_data);
    }

    if meta.iptc.is_modified() {
        replace_iptc(&mut jpeg, &meta.iptc.to_bytes());
    }

    let output = jpeg.encoder().bytes();
    std::fs::write(path, &output)
        .with_context(|| format!("Failed to write JPEG file {}", path.display()))?;
    Ok(())
}

fn replace_exif(jpeg: &mut Jpeg, tiff_data: Vec<u8>) {
    let orig_exif_pos = find_exif_segment_pos(jpeg);
    jpeg.set_exif(Some(Bytes::from(tiff_data)));

    // set_exif() inserts at position 3; put the segment back where it was so
    // EXIF keeps preceding XMP.
    if let Some(new_pos) = find_exif_segment_pos(jpeg) {
        let target_pos = orig_exif_pos.unwrap_or(1).min(new_pos);
        if new_pos != target_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target_pos, seg);
        }
    }
}

fn replace_iptc(jpeg: &mut Jpeg, iim: &[u8]) {
    let iptc_pos = find_app13_pos(jpeg);
    let existing = iptc_pos.map(|pos| jpeg.segments()[pos].contents().to_vec());
    let contents = build_app13(existing.as_deref(), iim);
    let new_segment = JpegSegment::new_with_contents(APP13, Bytes::from(contents));

    let after_app1 = jpeg
        .segments()
        .iter()
        .rposition(|s| s.marker() == 0xE1)
        .map(|pos| pos + 1);
    let segments = jpeg.segments_mut();
    match iptc_pos {
        Some(pos) => segments[pos] = new_segment,
        None => {
            let insert_pos = after_app1.unwrap_or(1).min(segments.len());
            segments.insert(insert_pos, new_segment);
        }
    }
}

/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}
