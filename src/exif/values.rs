use chrono::{DateTime, NaiveDateTime};
use nom_exif::*;
use std::collections::BTreeMap;
use std::path::Path;

use super::tiff::{TAG_ARTIST, TAG_COPYRIGHT, TAG_DATE_TIME, TAG_DATE_TIME_ORIGINAL, TAG_IMAGE_DESCRIPTION};

pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// IFD0 and Exif IFD tags read as text.
const TEXT_TAGS: [u16; 5] = [TAG_IMAGE_DESCRIPTION, TAG_ARTIST, TAG_COPYRIGHT, TAG_DATE_TIME, TAG_DATE_TIME_ORIGINAL];

const DATE_TAGS: [u16; 2] = [TAG_DATE_TIME, TAG_DATE_TIME_ORIGINAL];

/// GPS position as reported by the EXIF parser: degrees, minutes and
/// seconds with their hemisphere references.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsPosition {
    pub latitude: [(u32, u32); 3],
    pub latitude_ref: char,
    pub longitude: [(u32, u32); 3],
    pub longitude_ref: char,
    pub altitude: (u32, u32),
    /// 1 below sea level.
    pub altitude_ref: u8,
}

/// The EXIF values of a photo as stored on disk.
#[derive(Debug, Clone, Default)]
pub struct ExifValues {
    text: BTreeMap<u16, String>,
    gps: Option<GpsPosition>,
}

impl ExifValues {
    /// Read the EXIF values of an image file. A file without (parseable) EXIF
    /// yields no values.
    pub fn read(path: &Path) -> Self {
        let mut parser = MediaParser::new();
        let ms = match MediaSource::file_path(path) {
            Ok(ms) => ms,
            Err(e) => {
                log::debug!("Cannot open {} for EXIF parsing: {e}", path.display());
                return Self::default();
            }
        };

        let iter: ExifIter = match parser.parse(ms) {
            Ok(iter) => iter,
            Err(_) => {
                log::debug!("No EXIF data found in {}", path.display());
                return Self::default();
            }
        };

        // Parse GPS info before converting to Exif (consumes the iterator)
        let gps = iter.parse_gps_info().ok().flatten().map(|info| gps_position(&info));
        let exif: Exif = iter.into();

        let mut text = BTreeMap::new();
        for tag in TEXT_TAGS {
            let Some(value) = exif.get_by_ifd_tag_code(0, tag) else {
                continue;
            };
            let mut value = entry_text(value);
            if DATE_TAGS.contains(&tag) {
                if let Some(normalised) = normalise_timestamp(&value) {
                    value = normalised;
                }
            }
            text.insert(tag, value);
        }

        Self { text, gps }
    }

    /// Text of one of the IFD0/Exif IFD text tags.
    pub fn text(&self, tag: u16) -> Option<&str> {
        self.text.get(&tag).map(String::as_str)
    }

    /// DateTimeOriginal, falling back to DateTime, in EXIF notation.
    pub fn capture_date(&self) -> Option<String> {
        [TAG_DATE_TIME_ORIGINAL, TAG_DATE_TIME]
            .into_iter()
            .filter_map(|tag| self.text(tag))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    pub fn gps(&self) -> Option<GpsPosition> {
        self.gps
    }
}

fn entry_text(value: &EntryValue) -> String {
    match value {
        EntryValue::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The parser reports timestamps in its own notation; bring them back to
/// `YYYY:MM:DD HH:MM:SS`. The wall-clock time is kept, any offset dropped.
fn normalise_timestamp(value: &str) -> Option<String> {
    let value = value.trim();
    let naive = DateTime::parse_from_rfc3339(value)
        .map(|t| t.naive_local())
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %:z"]
                .into_iter()
                .find_map(|format| DateTime::parse_from_str(value, format).ok())
                .map(|t| t.naive_local())
        })
        .or_else(|| {
            [EXIF_DATETIME_FORMAT, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .into_iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        })?;
    Some(naive.format(EXIF_DATETIME_FORMAT).to_string())
}

fn gps_position(info: &GPSInfo) -> GpsPosition {
    let dms = |latlng: &LatLng| [(latlng.0.0, latlng.0.1), (latlng.1.0, latlng.1.1), (latlng.2.0, latlng.2.1)];
    GpsPosition {
        latitude: dms(&info.latitude),
        latitude_ref: info.latitude_ref,
        longitude: dms(&info.longitude),
        longitude_ref: info.longitude_ref,
        altitude: (info.altitude.0, info.altitude.1),
        altitude_ref: info.altitude_ref,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── timestamps ───────────────────────────────────────────────────

    #[test]
    fn timestamps_come_back_in_exif_notation() {
        assert_eq!(normalise_timestamp("2021-06-01T10:00:00+02:00").as_deref(), Some("2021:06:01 10:00:00"));
        assert_eq!(normalise_timestamp("2021-06-01 10:00:00 +02:00").as_deref(), Some("2021:06:01 10:00:00"));
        assert_eq!(normalise_timestamp("1923-05-17 14:30:00").as_deref(), Some("1923:05:17 14:30:00"));
        assert_eq!(normalise_timestamp("1923:05:17 14:30:00").as_deref(), Some("1923:05:17 14:30:00"));
        assert_eq!(normalise_timestamp("sometime in 1890"), None);
    }

    #[test]
    fn capture_date_prefers_original() {
        let mut values = ExifValues::default();
        values.text.insert(TAG_DATE_TIME, "2001:01:01 00:00:00".into());
        assert_eq!(values.capture_date().as_deref(), Some("2001:01:01 00:00:00"));

        values.text.insert(TAG_DATE_TIME_ORIGINAL, "1999:12:31 23:59:59".into());
        assert_eq!(values.capture_date().as_deref(), Some("1999:12:31 23:59:59"));

        values.text.insert(TAG_DATE_TIME_ORIGINAL, "  ".into());
        assert_eq!(values.capture_date().as_deref(), Some("2001:01:01 00:00:00"));
    }

    // ── files ────────────────────────────────────────────────────────

    #[test]
    fn jpeg_without_exif_has_no_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        image::RgbImage::new(8, 8).save(&path).unwrap();
        let values = ExifValues::read(&path);
        assert!(values.text(TAG_ARTIST).is_none());
        assert!(values.gps().is_none());
        assert!(values.capture_date().is_none());
    }
}
