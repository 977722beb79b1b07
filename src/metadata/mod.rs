//! Logical photo metadata and its mapping onto EXIF/IPTC.
//!
//! A [`LogicalRecord`] is the collection's own view of a photo (caption,
//! credits, keywords, capture date, position). [`MetadataCodec`] translates
//! between records and the embedded blocks handled by [`crate::exif`],
//! eliding collection defaults and maintaining the caption colophon.

mod codec;
pub mod colophon;
pub mod fields;
pub mod gps;
pub mod keywords;
mod record;

pub use codec::MetadataCodec;
pub use colophon::{CAPTION_SEP, Colophon};
pub use fields::{FIELD_MAPPINGS, Field, FieldMapping};
pub use record::{Location, LogicalRecord};
