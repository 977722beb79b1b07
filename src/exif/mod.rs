//! EXIF and IPTC metadata embedded in JPEG files.
//!
//! - [`read_embedded`]: Pull the EXIF (APP1) and IPTC (APP13) blocks out of a JPEG
//! - [`write_embedded`]: Write modified blocks back, leaving every other segment alone
//!
//! EXIF values are read with `nom-exif` ([`values`]). The [`tiff`] and
//! [`iptc`] modules hold the block codecs used for rewriting. Both keep the
//! fields they do not understand, so a rewrite only changes what was edited.

pub mod iptc;
mod reader;
pub mod tiff;
pub mod values;
mod writer;

pub use iptc::Iptc;
pub use reader::{EmbeddedMetadata, read_embedded};
pub use tiff::{Ifd, TagValue, Tiff};
pub use values::{ExifValues, GpsPosition};
pub use writer::write_embedded;

/// Decode text stored by some other tool: UTF-8 when valid, Latin-1 otherwise.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
