use anyhow::{Context, Result};
use std::collections::BTreeMap;

// IFD0
pub const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_ARTIST: u16 = 0x013B;
pub const TAG_COPYRIGHT: u16 = 0x8298;
pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
pub const TAG_GPS_IFD_POINTER: u16 = 0x8825;
// Exif IFD (also tolerated in IFD0 when reading)
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
// GPS IFD
pub const TAG_GPS_VERSION_ID: u16 = 0x0000;
pub const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
pub const TAG_GPS_LATITUDE: u16 = 0x0002;
pub const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
pub const TAG_GPS_LONGITUDE: u16 = 0x0004;
pub const TAG_GPS_ALTITUDE_REF: u16 = 0x0005;
pub const TAG_GPS_ALTITUDE: u16 = 0x0006;
pub const TAG_GPS_MAP_DATUM: u16 = 0x0012;

// TIFF field types
const FORMAT_BYTE: u16 = 1;
const FORMAT_ASCII: u16 = 2;
const FORMAT_LONG: u16 = 4;
const FORMAT_RATIONAL: u16 = 5;

/// Largest TIFF block that fits a JPEG APP1 segment (64K minus length field and `Exif\0\0`).
pub const MAX_JPEG_EXIF_LEN: usize = 65533 - 6;

const SUB_IFDS: [(Ifd, u16); 2] = [
    (Ifd::Exif, TAG_EXIF_IFD_POINTER),
    (Ifd::Gps, TAG_GPS_IFD_POINTER),
];

/// The directories this codec reads and rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ifd {
    Primary,
    Exif,
    Gps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let b = data.get(offset..offset.checked_add(2)?)?;
        Some(match self {
            Self::Little => u16::from_le_bytes([b[0], b[1]]),
            Self::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let b = data.get(offset..offset.checked_add(4)?)?;
        Some(match self {
            Self::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            Self::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    fn encode_u16(self, val: u16) -> [u8; 2] {
        match self {
            Self::Little => val.to_le_bytes(),
            Self::Big => val.to_be_bytes(),
        }
    }

    fn encode_u32(self, val: u32) -> [u8; 4] {
        match self {
            Self::Little => val.to_le_bytes(),
            Self::Big => val.to_be_bytes(),
        }
    }
}

/// A value to store in a directory entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Ascii(String),
    Byte(Vec<u8>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
}

impl TagValue {
    fn format(&self) -> u16 {
        match self {
            Self::Ascii(_) => FORMAT_ASCII,
            Self::Byte(_) => FORMAT_BYTE,
            Self::Long(_) => FORMAT_LONG,
            Self::Rational(_) => FORMAT_RATIONAL,
        }
    }

    fn count(&self) -> u32 {
        match self {
            Self::Ascii(s) => s.len() as u32 + 1,
            Self::Byte(v) => v.len() as u32,
            Self::Long(v) => v.len() as u32,
            Self::Rational(v) => v.len() as u32,
        }
    }

    fn encode(&self, order: ByteOrder) -> Vec<u8> {
        match self {
            Self::Ascii(s) => {
                let mut data = s.as_bytes().to_vec();
                data.push(0);
                data
            }
            Self::Byte(v) => v.clone(),
            Self::Long(v) => v.iter().flat_map(|n| order.encode_u32(*n)).collect(),
            Self::Rational(v) => v
                .iter()
                .flat_map(|(num, den)| {
                    let mut pair = [0u8; 8];
                    pair[..4].copy_from_slice(&order.encode_u32(*num));
                    pair[4..].copy_from_slice(&order.encode_u32(*den));
                    pair
                })
                .collect(),
        }
    }
}

fn component_size(format: u16) -> Option<usize> {
    match format {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 | 13 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// A directory entry exactly as stored: the 4-byte field is either the inline
/// value or an offset into the block.
#[derive(Debug, Clone, Copy)]
struct RawEntry {
    tag: u16,
    format: u16,
    count: u32,
    field: [u8; 4],
}

impl RawEntry {
    fn data_len(&self) -> Option<usize> {
        component_size(self.format)?.checked_mul(self.count as usize)
    }

    /// Byte range of out-of-line data, if the value does not fit the entry.
    fn data_range(&self, order: ByteOrder) -> Option<(usize, usize)> {
        let len = self.data_len()?;
        if len <= 4 {
            return None;
        }
        let start = order.u32(&self.field, 0)? as usize;
        Some((start, start.checked_add(len)?))
    }

    fn to_bytes(self, order: ByteOrder) -> [u8; 12] {
        let mut raw = [0u8; 12];
        raw[0..2].copy_from_slice(&order.encode_u16(self.tag));
        raw[2..4].copy_from_slice(&order.encode_u16(self.format));
        raw[4..8].copy_from_slice(&order.encode_u32(self.count));
        raw[8..12].copy_from_slice(&self.field);
        raw
    }
}

#[derive(Debug, Clone, Default)]
struct Directory {
    offset: usize,
    entries: Vec<RawEntry>,
    next: u32,
}

impl Directory {
    fn table_range(&self) -> (usize, usize) {
        (self.offset, self.offset + 2 + self.entries.len() * 12 + 4)
    }
}

enum Slot<'a> {
    Keep(RawEntry),
    New(&'a TagValue),
}

/// An EXIF block (TIFF structure) with pending tag edits.
///
/// Only IFD0, the Exif IFD and the GPS IFD are decoded. Edits rebuild just the
/// directories they touch and append them to the block; every other byte keeps
/// its offset, so maker notes and the thumbnail directory survive untouched.
#[derive(Debug, Clone)]
pub struct Tiff {
    data: Vec<u8>,
    order: ByteOrder,
    dirs: BTreeMap<Ifd, Directory>,
    pending: BTreeMap<(Ifd, u16), TagValue>,
}

impl Tiff {
    /// An empty little-endian block with a single empty IFD0.
    pub fn empty() -> Self {
        let mut data = b"II*\0".to_vec();
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut dirs = BTreeMap::new();
        dirs.insert(Ifd::Primary, Directory { offset: 8, entries: Vec::new(), next: 0 });
        Self { data, order: ByteOrder::Little, dirs, pending: BTreeMap::new() }
    }

    /// Parse raw TIFF data (the APP1 payload after `Exif\0\0`).
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if data.len() < 8 {
            anyhow::bail!("TIFF data too short");
        }
        let order = match &data[0..2] {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => anyhow::bail!("Invalid TIFF byte order"),
        };
        if order.u16(&data, 2) != Some(42) {
            anyhow::bail!("Invalid TIFF magic number");
        }

        let ifd0_offset = order.u32(&data, 4).context("TIFF header truncated")? as usize;
        let ifd0 = read_directory(&data, order, ifd0_offset).context("Failed to read IFD0")?;

        let mut dirs = BTreeMap::new();
        for (ifd, pointer_tag) in SUB_IFDS {
            let Some(pointer) = ifd0.entries.iter().find(|e| e.tag == pointer_tag) else {
                continue;
            };
            let offset = order.u32(&pointer.field, 0).unwrap_or(0) as usize;
            match read_directory(&data, order, offset) {
                Ok(dir) => {
                    dirs.insert(ifd, dir);
                }
                Err(e) => log::warn!("Ignoring unreadable {ifd:?} directory: {e}"),
            }
        }
        dirs.insert(Ifd::Primary, ifd0);

        Ok(Self { data, order, dirs, pending: BTreeMap::new() })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn entry(&self, ifd: Ifd, tag: u16) -> Option<&RawEntry> {
        self.dirs.get(&ifd)?.entries.iter().find(|e| e.tag == tag)
    }

    /// Whether the tag exists, either stored or pending.
    pub fn contains(&self, ifd: Ifd, tag: u16) -> bool {
        self.pending.contains_key(&(ifd, tag)) || self.entry(ifd, tag).is_some()
    }

    /// Queue a tag to be written by [`Tiff::to_bytes`].
    pub fn set(&mut self, ifd: Ifd, tag: u16, value: TagValue) {
        self.pending.insert((ifd, tag), value);
    }

    pub fn is_modified(&self) -> bool {
        !self.pending.is_empty()
    }

    fn edits_for(&self, ifd: Ifd) -> Vec<(u16, TagValue)> {
        self.pending
            .iter()
            .filter(|((i, _), _)| *i == ifd)
            .map(|((_, tag), value)| (*tag, value.clone()))
            .collect()
    }

    /// Serialize the block with all pending edits applied.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.pending.is_empty() {
            return Ok(self.data.clone());
        }

        let mut out = self.data.clone();
        out.truncate(self.reclaimable_tail());

        // Sub-IFDs first, so IFD0 can point at their new offsets.
        let mut ifd0_edits = self.edits_for(Ifd::Primary);
        for (ifd, pointer_tag) in SUB_IFDS {
            let edits = self.edits_for(ifd);
            if edits.is_empty() {
                continue;
            }
            let offset = self.write_directory(&mut out, self.dirs.get(&ifd), &edits)?;
            ifd0_edits.push((pointer_tag, TagValue::Long(vec![offset])));
        }

        let offset = self.write_directory(&mut out, self.dirs.get(&Ifd::Primary), &ifd0_edits)?;
        out[4..8].copy_from_slice(&self.order.encode_u32(offset));
        Ok(out)
    }

    /// Append a rebuilt directory (existing entries merged with edits, sorted by tag)
    /// and return its offset.
    fn write_directory(
        &self,
        out: &mut Vec<u8>,
        existing: Option<&Directory>,
        edits: &[(u16, TagValue)],
    ) -> Result<u32> {
        let order = self.order;
        let mut slots: BTreeMap<u16, Slot<'_>> = BTreeMap::new();
        if let Some(dir) = existing {
            for entry in &dir.entries {
                slots.entry(entry.tag).or_insert(Slot::Keep(*entry));
            }
        }
        for (tag, value) in edits {
            slots.insert(*tag, Slot::New(value));
        }

        pad_to_word(out);
        let start = out.len();
        out.extend_from_slice(&order.encode_u16(slots.len() as u16));
        let table = out.len();
        out.resize(table + slots.len() * 12, 0);
        let next = existing.map(|d| d.next).unwrap_or(0);
        out.extend_from_slice(&order.encode_u32(next));

        for (i, (tag, slot)) in slots.into_iter().enumerate() {
            let entry = match slot {
                Slot::Keep(entry) => entry,
                Slot::New(value) => {
                    let data = value.encode(order);
                    let mut field = [0u8; 4];
                    if data.len() <= 4 {
                        field[..data.len()].copy_from_slice(&data);
                    } else {
                        pad_to_word(out);
                        let offset = u32::try_from(out.len()).context("EXIF block too large")?;
                        field = order.encode_u32(offset);
                        out.extend_from_slice(&data);
                    }
                    RawEntry { tag, format: value.format(), count: value.count(), field }
                }
            };
            let at = table + i * 12;
            out[at..at + 12].copy_from_slice(&entry.to_bytes(order));
        }

        u32::try_from(start).context("EXIF block too large")
    }

    /// Length the block can be cut back to before appending: directories about
    /// to be rebuilt, and data of entries about to be replaced, are dropped when
    /// they form the tail of the block (typically what the previous write appended).
    fn reclaimable_tail(&self) -> usize {
        let order = self.order;
        let mut owned: Vec<(usize, usize)> = Vec::new();
        let mut kept_end = 8usize;

        for (ifd, dir) in &self.dirs {
            let rebuilt = *ifd == Ifd::Primary || self.pending.keys().any(|(i, _)| i == ifd);
            if rebuilt {
                owned.push(dir.table_range());
            } else {
                kept_end = kept_end.max(dir.table_range().1);
            }
            for entry in &dir.entries {
                let Some(range) = entry.data_range(order) else {
                    continue;
                };
                if rebuilt && self.pending.contains_key(&(*ifd, entry.tag)) {
                    owned.push(range);
                } else {
                    kept_end = kept_end.max(range.1);
                }
            }
        }

        // A thumbnail directory chained from IFD0 must never be cut.
        if let Some(ifd0) = self.dirs.get(&Ifd::Primary) {
            if ifd0.next != 0 {
                kept_end = kept_end.max(ifd0.next as usize + 2);
            }
        }

        let mut tail = self.data.len();
        loop {
            let step = owned
                .iter()
                .filter(|(start, end)| *start < tail && *end <= tail && *end + 1 >= tail)
                .map(|(start, _)| *start)
                .min();
            match step {
                Some(start) if start >= kept_end => tail = start,
                _ => break,
            }
        }
        tail
    }
}

fn pad_to_word(out: &mut Vec<u8>) {
    if out.len() % 2 != 0 {
        out.push(0);
    }
}

fn read_directory(data: &[u8], order: ByteOrder, offset: usize) -> Result<Directory> {
    let count = order
        .u16(data, offset)
        .context("Directory offset out of bounds")? as usize;
    let start = offset + 2;
    let end = start + count * 12;
    let next = order
        .u32(data, end)
        .context("Directory entries extend beyond TIFF data")?;

    let entries = (0..count)
        .map(|i| {
            let at = start + i * 12;
            let mut field = [0u8; 4];
            field.copy_from_slice(&data[at + 8..at + 12]);
            RawEntry {
                tag: order.u16(data, at).unwrap_or_default(),
                format: order.u16(data, at + 2).unwrap_or_default(),
                count: order.u32(data, at + 4).unwrap_or_default(),
                field,
            }
        })
        .collect();

    Ok(Directory { offset, entries, next })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::decode_text;

    const FORMAT_SHORT: u16 = 3;
    const FORMAT_UNDEFINED: u16 = 7;

    /// Raw readers for checking what a rebuilt block holds.
    impl Tiff {
        fn value_bytes<'a>(&'a self, entry: &'a RawEntry) -> Option<&'a [u8]> {
            let len = entry.data_len()?;
            match entry.data_range(self.order) {
                Some((start, end)) => self.data.get(start..end),
                None => Some(&entry.field[..len]),
            }
        }

        /// Text value of an ASCII (or UNDEFINED) tag, up to the first NUL.
        pub fn ascii(&self, ifd: Ifd, tag: u16) -> Option<String> {
            let entry = self.entry(ifd, tag)?;
            if entry.format != FORMAT_ASCII && entry.format != FORMAT_UNDEFINED {
                return None;
            }
            let bytes = self.value_bytes(entry)?;
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Some(decode_text(&bytes[..end]))
        }

        /// Unsigned rational components of a RATIONAL tag.
        pub fn rationals(&self, ifd: Ifd, tag: u16) -> Option<Vec<(u32, u32)>> {
            let entry = self.entry(ifd, tag)?;
            if entry.format != FORMAT_RATIONAL {
                return None;
            }
            let bytes = self.value_bytes(entry)?;
            bytes
                .chunks_exact(8)
                .map(|pair| Some((self.order.u32(pair, 0)?, self.order.u32(pair, 4)?)))
                .collect()
        }

        /// First value of a small integer tag (BYTE, UNDEFINED, SHORT, or a digit stored as ASCII).
        pub fn small_int(&self, ifd: Ifd, tag: u16) -> Option<u32> {
            let entry = self.entry(ifd, tag)?;
            let bytes = self.value_bytes(entry)?;
            match entry.format {
                FORMAT_BYTE | FORMAT_UNDEFINED => bytes.first().map(|&b| u32::from(b)),
                FORMAT_SHORT => self.order.u16(bytes, 0).map(u32::from),
                FORMAT_LONG => self.order.u32(bytes, 0),
                FORMAT_ASCII => {
                    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                    decode_text(&bytes[..end]).trim().parse().ok()
                }
                _ => None,
            }
        }
    }

    /// Big-endian block: IFD0 with Make ("Canon") and an unknown tag, no sub-IFDs.
    fn big_endian_sample() -> Vec<u8> {
        let mut data = b"MM\0*".to_vec();
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());
        // Make (0x010F), ASCII, 6 bytes at offset 38
        data.extend_from_slice(&0x010Fu16.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&6u32.to_be_bytes());
        data.extend_from_slice(&38u32.to_be_bytes());
        // Unknown private tag 0xC000, SHORT, inline value 7
        data.extend_from_slice(&0xC000u16.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0, 7, 0, 0]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"Canon\0");
        data
    }

    // ── parsing ──────────────────────────────────────────────────────

    #[test]
    fn parse_rejects_garbage() {
        assert!(Tiff::parse(b"nope".to_vec()).is_err());
        assert!(Tiff::parse(b"XX\0*\0\0\0\x08\0\0\0\0".to_vec()).is_err());
    }

    #[test]
    fn parse_big_endian() {
        let tiff = Tiff::parse(big_endian_sample()).unwrap();
        assert_eq!(tiff.byte_order(), ByteOrder::Big);
        assert_eq!(tiff.ascii(Ifd::Primary, 0x010F).as_deref(), Some("Canon"));
        assert_eq!(tiff.small_int(Ifd::Primary, 0xC000), Some(7));
        assert!(tiff.ascii(Ifd::Exif, TAG_DATE_TIME_ORIGINAL).is_none());
    }

    #[test]
    fn unmodified_block_is_returned_verbatim() {
        let original = big_endian_sample();
        let tiff = Tiff::parse(original.clone()).unwrap();
        assert!(!tiff.is_modified());
        assert_eq!(tiff.to_bytes().unwrap(), original);
    }

    // ── editing ──────────────────────────────────────────────────────

    #[test]
    fn set_tags_in_all_directories() {
        let mut tiff = Tiff::empty();
        tiff.set(Ifd::Primary, TAG_ARTIST, TagValue::Ascii("Dirk Roorda".into()));
        tiff.set(Ifd::Exif, TAG_DATE_TIME_ORIGINAL, TagValue::Ascii("2021:06:01 12:00:00".into()));
        tiff.set(Ifd::Gps, TAG_GPS_LATITUDE, TagValue::Rational(vec![(52, 1), (8, 1), (113019, 2500)]));
        tiff.set(Ifd::Gps, TAG_GPS_ALTITUDE_REF, TagValue::Byte(vec![1]));

        let reparsed = Tiff::parse(tiff.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed.ascii(Ifd::Primary, TAG_ARTIST).as_deref(), Some("Dirk Roorda"));
        assert_eq!(
            reparsed.ascii(Ifd::Exif, TAG_DATE_TIME_ORIGINAL).as_deref(),
            Some("2021:06:01 12:00:00")
        );
        assert_eq!(
            reparsed.rationals(Ifd::Gps, TAG_GPS_LATITUDE),
            Some(vec![(52, 1), (8, 1), (113019, 2500)])
        );
        assert_eq!(reparsed.small_int(Ifd::Gps, TAG_GPS_ALTITUDE_REF), Some(1));
    }

    #[test]
    fn edits_preserve_unknown_tags_and_byte_order() {
        let mut tiff = Tiff::parse(big_endian_sample()).unwrap();
        tiff.set(Ifd::Primary, TAG_COPYRIGHT, TagValue::Ascii("CC-BY".into()));

        let reparsed = Tiff::parse(tiff.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed.byte_order(), ByteOrder::Big);
        assert_eq!(reparsed.ascii(Ifd::Primary, 0x010F).as_deref(), Some("Canon"));
        assert_eq!(reparsed.small_int(Ifd::Primary, 0xC000), Some(7));
        assert_eq!(reparsed.ascii(Ifd::Primary, TAG_COPYRIGHT).as_deref(), Some("CC-BY"));
    }

    #[test]
    fn replacing_a_tag_keeps_a_single_entry() {
        let mut tiff = Tiff::empty();
        tiff.set(Ifd::Primary, TAG_ARTIST, TagValue::Ascii("first".into()));
        let mut again = Tiff::parse(tiff.to_bytes().unwrap()).unwrap();
        again.set(Ifd::Primary, TAG_ARTIST, TagValue::Ascii("second".into()));
        let bytes = again.to_bytes().unwrap();
        let reparsed = Tiff::parse(bytes).unwrap();
        assert_eq!(reparsed.ascii(Ifd::Primary, TAG_ARTIST).as_deref(), Some("second"));
        assert_eq!(reparsed.dirs[&Ifd::Primary].entries.len(), 1);
    }

    #[test]
    fn entries_are_sorted_by_tag() {
        let mut tiff = Tiff::empty();
        tiff.set(Ifd::Primary, TAG_COPYRIGHT, TagValue::Ascii("c".into()));
        tiff.set(Ifd::Primary, TAG_IMAGE_DESCRIPTION, TagValue::Ascii("d".into()));
        let reparsed = Tiff::parse(tiff.to_bytes().unwrap()).unwrap();
        let tags: Vec<u16> = reparsed.dirs[&Ifd::Primary].entries.iter().map(|e| e.tag).collect();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
    }

    #[test]
    fn repeated_rewrites_do_not_grow_the_block() {
        let caption = "A fairly long caption that certainly does not fit inline".to_string();
        let mut tiff = Tiff::parse(big_endian_sample()).unwrap();
        tiff.set(Ifd::Primary, TAG_IMAGE_DESCRIPTION, TagValue::Ascii(caption.clone()));
        tiff.set(Ifd::Exif, TAG_DATE_TIME_ORIGINAL, TagValue::Ascii("2020:01:01 00:00:00".into()));
        let first = tiff.to_bytes().unwrap();

        let mut second = Tiff::parse(first.clone()).unwrap();
        second.set(Ifd::Primary, TAG_IMAGE_DESCRIPTION, TagValue::Ascii(caption.clone()));
        second.set(Ifd::Exif, TAG_DATE_TIME_ORIGINAL, TagValue::Ascii("2020:01:01 00:00:00".into()));
        let second_bytes = second.to_bytes().unwrap();

        assert_eq!(second_bytes.len(), first.len());
        let reparsed = Tiff::parse(second_bytes).unwrap();
        assert_eq!(reparsed.ascii(Ifd::Primary, TAG_IMAGE_DESCRIPTION), Some(caption));
        assert_eq!(reparsed.ascii(Ifd::Primary, 0x010F).as_deref(), Some("Canon"));
    }

    #[test]
    fn contains_sees_pending_edits() {
        let mut tiff = Tiff::empty();
        assert!(!tiff.contains(Ifd::Gps, TAG_GPS_VERSION_ID));
        tiff.set(Ifd::Gps, TAG_GPS_VERSION_ID, TagValue::Byte(vec![2, 2, 0, 0]));
        assert!(tiff.contains(Ifd::Gps, TAG_GPS_VERSION_ID));
    }
}
