use crate::exif::Ifd;
use crate::exif::iptc::{
    DS_BYLINE, DS_CAPTION, DS_COPYRIGHT, DS_CREDIT, DS_KEYWORDS, DS_SOURCE, DS_WRITER,
};
use crate::exif::tiff::{TAG_ARTIST, TAG_COPYRIGHT, TAG_DATE_TIME, TAG_IMAGE_DESCRIPTION};

/// The logical fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Source,
    Credit,
    Copyright,
    Author,
    Writer,
    Caption,
    Keywords,
    Datetime,
    Location,
}

impl Field {
    /// Single-valued text fields, in the order they are processed.
    pub const TEXT: [Field; 7] = [
        Field::Source,
        Field::Credit,
        Field::Copyright,
        Field::Author,
        Field::Writer,
        Field::Caption,
        Field::Datetime,
    ];

    /// Key used in record files and caption templates.
    pub fn name(self) -> &'static str {
        match self {
            Field::Source => "source",
            Field::Credit => "credit",
            Field::Copyright => "copyright",
            Field::Author => "author",
            Field::Writer => "writer",
            Field::Caption => "caption",
            Field::Keywords => "keywords",
            Field::Datetime => "datetime",
            Field::Location => "location",
        }
    }
}

/// Where a field lives in the embedded metadata.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub field: Field,
    /// IPTC application-record dataset number.
    pub iptc: Option<u8>,
    /// EXIF tag holding the same value as text.
    pub exif: Option<(Ifd, u16)>,
}

/// Datetime and location span several tags and are handled by the codec
/// directly; their entries here only document the primary tag.
pub const FIELD_MAPPINGS: [FieldMapping; 9] = [
    FieldMapping { field: Field::Source, iptc: Some(DS_SOURCE), exif: None },
    FieldMapping { field: Field::Credit, iptc: Some(DS_CREDIT), exif: None },
    FieldMapping { field: Field::Copyright, iptc: Some(DS_COPYRIGHT), exif: Some((Ifd::Primary, TAG_COPYRIGHT)) },
    FieldMapping { field: Field::Author, iptc: Some(DS_BYLINE), exif: Some((Ifd::Primary, TAG_ARTIST)) },
    FieldMapping { field: Field::Writer, iptc: Some(DS_WRITER), exif: None },
    FieldMapping { field: Field::Caption, iptc: Some(DS_CAPTION), exif: Some((Ifd::Primary, TAG_IMAGE_DESCRIPTION)) },
    FieldMapping { field: Field::Keywords, iptc: Some(DS_KEYWORDS), exif: None },
    FieldMapping { field: Field::Datetime, iptc: None, exif: Some((Ifd::Primary, TAG_DATE_TIME)) },
    FieldMapping { field: Field::Location, iptc: None, exif: None },
];

pub fn mapping(field: Field) -> &'static FieldMapping {
    // Every Field has exactly one entry, in declaration order.
    &FIELD_MAPPINGS[field as usize]
}
