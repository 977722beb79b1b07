use anyhow::Result;
use chrono::NaiveDateTime;
use std::path::Path;

use crate::config::CollectionConfig;
use crate::exif::iptc::{
    DS_DATE_CREATED, DS_DIGITIZATION_DATE, DS_DIGITIZATION_TIME, DS_KEYWORDS, DS_TIME_CREATED,
};
use crate::exif::tiff::{TAG_DATE_TIME, TAG_DATE_TIME_ORIGINAL};
use crate::exif::values::EXIF_DATETIME_FORMAT;
use crate::exif::{EmbeddedMetadata, Ifd, Iptc, TagValue, Tiff, read_embedded, write_embedded};

use super::colophon::{Colophon, TemplateFields, interpolate, quote_plus};
use super::fields::{Field, mapping};
use super::{gps, keywords};
use super::record::LogicalRecord;

/// Maps logical records onto the EXIF/IPTC fields of a photo and back.
#[derive(Debug, Clone)]
pub struct MetadataCodec {
    defaults: LogicalRecord,
    default_keywords: Vec<String>,
    colophon: Colophon,
}

impl MetadataCodec {
    pub fn new(defaults: LogicalRecord, colophon: Colophon) -> Self {
        let default_keywords = keywords::merge(defaults.keywords.as_deref().unwrap_or_default(), &[]);
        Self { defaults, default_keywords, colophon }
    }

    pub fn from_config(config: &CollectionConfig) -> Result<Self> {
        let colophon = Colophon::new(config.colofon.clone(), &config.source_marker)?;
        Ok(Self::new(config.meta_defaults.clone(), colophon))
    }

    pub fn defaults(&self) -> &LogicalRecord {
        &self.defaults
    }

    pub fn default_keywords(&self) -> &[String] {
        &self.default_keywords
    }

    /// Read a photo's logical record. When `expanded` is false, values equal to
    /// the collection defaults are left out and the caption loses its colophon.
    pub fn extract(&self, path: &Path, expanded: bool) -> Result<LogicalRecord> {
        let embedded = read_embedded(path)?;
        Ok(self.decode(&embedded, expanded))
    }

    /// Write a record (merged over the defaults) into a photo.
    pub fn apply(&self, path: &Path, record: &LogicalRecord) -> Result<()> {
        let mut embedded = read_embedded(path)?;
        self.encode(record, &mut embedded);
        write_embedded(path, &embedded)
    }

    /// Raw capture timestamp of a photo, if it has one.
    pub fn capture_date(&self, path: &Path) -> Result<Option<String>> {
        let embedded = read_embedded(path)?;
        Ok(embedded.values.capture_date())
    }

    pub fn decode(&self, embedded: &EmbeddedMetadata, expanded: bool) -> LogicalRecord {
        let values = &embedded.values;
        let iptc = &embedded.iptc;

        let mut actual = TemplateFields::new();
        for field in Field::TEXT {
            let value = if field == Field::Datetime {
                values.capture_date().unwrap_or_default()
            } else {
                let m = mapping(field);
                let iptc_value = m.iptc.map(|n| iptc.strings(n).join("\n")).unwrap_or_default();
                let exif_value = m.exif.and_then(|(_, tag)| values.text(tag)).unwrap_or_default().to_string();
                let value = prefer(iptc_value, exif_value);
                if field == Field::Caption && !expanded {
                    self.colophon.strip(&value).to_string()
                } else {
                    value
                }
            };
            actual.insert(field.name().to_string(), value);
        }

        let found_keywords = iptc.strings(DS_KEYWORDS);
        let location = gps::read_location(values, &embedded.exif);
        actual.insert(Field::Keywords.name().to_string(), found_keywords.join(", "));
        actual.insert(Field::Location.name().to_string(), location.to_string());
        let source = actual.get(Field::Source.name()).cloned().unwrap_or_default();
        actual.insert("sourceAsUrl".to_string(), quote_plus(&source));

        let mut record = LogicalRecord::default();
        for field in Field::TEXT {
            let value = actual.get(field.name()).cloned().unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            let default = match field {
                Field::Copyright => self.defaults.copyright.as_deref().map(|t| interpolate(t, &actual)),
                _ => self.defaults.text(field).map(str::to_string),
            };
            if expanded || default.as_deref() != Some(value.as_str()) {
                if let Some(slot) = record.text_mut(field) {
                    *slot = Some(value);
                }
            }
        }

        record.keywords = if expanded {
            Some(keywords::merge(&found_keywords, &[]))
        } else {
            Some(keywords::subtract(&found_keywords, &self.default_keywords)).filter(|k| !k.is_empty())
        };

        record.location = if expanded {
            Some(location)
        } else {
            Some(location).filter(|l| !l.is_empty() && self.defaults.location.as_ref() != Some(l))
        };

        record
    }

    /// The record as it will be written: defaults filled in, copyright
    /// interpolated, caption re-annotated.
    pub fn merge(&self, record: &LogicalRecord) -> LogicalRecord {
        let mut merged = LogicalRecord::default();
        for field in Field::TEXT {
            if let Some(slot) = merged.text_mut(field) {
                *slot = record.text(field).or(self.defaults.text(field)).map(str::to_string);
            }
        }
        let record_keywords = record.keywords.as_deref().unwrap_or_default();
        merged.keywords = Some(keywords::merge(record_keywords, &self.default_keywords));
        merged.location = record.location.or(self.defaults.location);

        let fields = template_fields(&merged);
        if let Some(copyright) = merged.copyright.take() {
            merged.copyright = Some(interpolate(&copyright, &fields));
        }
        let fields = template_fields(&merged);
        merged.caption = Some(self.colophon.annotate(merged.caption.as_deref(), &fields));
        merged
    }

    pub fn encode(&self, record: &LogicalRecord, embedded: &mut EmbeddedMetadata) {
        let merged = self.merge(record);
        let tiff = &mut embedded.exif;
        let iptc = &mut embedded.iptc;

        for field in Field::TEXT {
            let Some(value) = merged.text(field) else {
                continue;
            };
            if field == Field::Datetime {
                write_datetime(tiff, iptc, value);
                continue;
            }
            let m = mapping(field);
            if let Some(number) = m.iptc {
                iptc.set(number, &[value.to_string()]);
            }
            if let Some((ifd, tag)) = m.exif {
                tiff.set(ifd, tag, TagValue::Ascii(value.to_string()));
            }
        }

        if let Some(keywords) = &merged.keywords {
            iptc.set(DS_KEYWORDS, keywords);
        }
        if let Some(location) = &merged.location {
            gps::write_location(tiff, location);
        }
    }
}

/// IPTC wins unless the EXIF value is non-empty and strictly longer.
fn prefer(iptc: String, exif: String) -> String {
    if iptc.is_empty() || (!exif.is_empty() && exif.chars().count() > iptc.chars().count()) {
        exif
    } else {
        iptc
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    [EXIF_DATETIME_FORMAT, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

fn write_datetime(tiff: &mut Tiff, iptc: &mut Iptc, value: &str) {
    tiff.set(Ifd::Primary, TAG_DATE_TIME, TagValue::Ascii(value.to_string()));
    tiff.set(Ifd::Exif, TAG_DATE_TIME_ORIGINAL, TagValue::Ascii(value.to_string()));

    let Some(timestamp) = parse_timestamp(value) else {
        log::warn!("Unrecognised datetime {value:?}; IPTC date fields left unchanged");
        return;
    };
    let date = timestamp.format("%Y%m%d").to_string();
    let time = timestamp.format("%H%M%S+0000").to_string();
    iptc.set(DS_DATE_CREATED, &[date.clone()]);
    iptc.set(DS_TIME_CREATED, &[time.clone()]);
    iptc.set(DS_DIGITIZATION_DATE, &[date]);
    iptc.set(DS_DIGITIZATION_TIME, &[time]);
}

fn template_fields(record: &LogicalRecord) -> TemplateFields {
    let mut fields = TemplateFields::new();
    for field in Field::TEXT {
        fields.insert(field.name().to_string(), record.text(field).unwrap_or_default().to_string());
    }
    let keywords = record.keywords.as_deref().unwrap_or_default().join(", ");
    fields.insert(Field::Keywords.name().to_string(), keywords);
    let location = record.location.map(|l| l.to_string()).unwrap_or_default();
    fields.insert(Field::Location.name().to_string(), location);
    if let Some(source) = &record.source {
        fields.insert("sourceAsUrl".to_string(), quote_plus(source));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::iptc::{DS_CAPTION, DS_SOURCE};
    use crate::exif::tiff::TAG_IMAGE_DESCRIPTION;
    use crate::metadata::Location;
    use crate::metadata::colophon::DEFAULT_SOURCE_MARKER;
    use tempfile::TempDir;

    fn codec() -> MetadataCodec {
        let defaults = LogicalRecord {
            author: Some("Archief Haarlem".into()),
            copyright: Some("© {author}, bron {source}".into()),
            credit: Some("Stichting Erfgoed".into()),
            keywords: Some(vec!["haarlem".into()]),
            ..Default::default()
        };
        let colophon = Colophon::new("Bron: {source} https://example.org/?q={sourceAsUrl}", DEFAULT_SOURCE_MARKER).unwrap();
        MetadataCodec::new(defaults, colophon)
    }

    fn sample_jpeg(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(format!("{name}.jpg"));
        image::RgbImage::new(8, 8).save(&path).unwrap();
        path
    }

    // ── extraction ───────────────────────────────────────────────────

    #[test]
    fn longer_exif_value_wins() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(&dir, "longer");
        let mut embedded = read_embedded(&path).unwrap();
        embedded.iptc.set(DS_CAPTION, &["short".to_string()]);
        embedded.exif.set(Ifd::Primary, TAG_IMAGE_DESCRIPTION, TagValue::Ascii("a longer caption".into()));
        write_embedded(&path, &embedded).unwrap();

        let record = codec().extract(&path, true).unwrap();
        assert_eq!(record.caption.as_deref(), Some("a longer caption"));
    }

    #[test]
    fn equal_length_prefers_iptc() {
        assert_eq!(prefer("iptc".into(), "exif".into()), "iptc");
        assert_eq!(prefer(String::new(), "exif".into()), "exif");
        assert_eq!(prefer("iptc".into(), String::new()), "iptc");
    }

    #[test]
    fn defaults_are_elided_when_not_expanded() {
        let mut embedded = EmbeddedMetadata::default();
        embedded.iptc.set(crate::exif::iptc::DS_BYLINE, &["Archief Haarlem".to_string()]);
        embedded.iptc.set(crate::exif::iptc::DS_CREDIT, &["Stichting Erfgoed".to_string()]);
        embedded.iptc.set(DS_SOURCE, &["NHA 12".to_string()]);
        embedded.iptc.set(crate::exif::iptc::DS_COPYRIGHT, &["© Archief Haarlem, bron NHA 12".to_string()]);
        embedded.iptc.set(DS_KEYWORDS, &["Haarlem".to_string(), "molen".to_string()]);

        let short = codec().decode(&embedded, false);
        assert_eq!(short.author, None);
        assert_eq!(short.credit, None);
        assert_eq!(short.copyright, None);
        assert_eq!(short.source.as_deref(), Some("NHA 12"));
        assert_eq!(short.keywords, Some(vec!["molen".to_string()]));
        assert_eq!(short.location, None);

        let full = codec().decode(&embedded, true);
        assert_eq!(full.credit.as_deref(), Some("Stichting Erfgoed"));
        assert_eq!(full.keywords, Some(vec!["Haarlem".to_string(), "molen".to_string()]));
        assert_eq!(full.location, Some(Location::default()));
    }

    #[test]
    fn caption_loses_colophon_unless_expanded() {
        let mut embedded = EmbeddedMetadata::default();
        embedded.iptc.set(DS_CAPTION, &["De molen\n---\nBron: x".to_string()]);
        assert_eq!(codec().decode(&embedded, false).caption.as_deref(), Some("De molen"));
        assert_eq!(codec().decode(&embedded, true).caption.as_deref(), Some("De molen\n---\nBron: x"));
    }

    #[test]
    fn datetime_prefers_original() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(&dir, "dated");
        let codec = codec();

        let mut embedded = read_embedded(&path).unwrap();
        embedded.exif.set(Ifd::Primary, TAG_DATE_TIME, TagValue::Ascii("2001:01:01 00:00:00".into()));
        write_embedded(&path, &embedded).unwrap();
        assert_eq!(codec.capture_date(&path).unwrap().as_deref(), Some("2001:01:01 00:00:00"));

        let mut embedded = read_embedded(&path).unwrap();
        embedded.exif.set(Ifd::Exif, TAG_DATE_TIME_ORIGINAL, TagValue::Ascii("1999:12:31 23:59:59".into()));
        write_embedded(&path, &embedded).unwrap();
        assert_eq!(codec.capture_date(&path).unwrap().as_deref(), Some("1999:12:31 23:59:59"));
        assert_eq!(codec.extract(&path, true).unwrap().datetime.as_deref(), Some("1999:12:31 23:59:59"));
    }

    // ── merging ──────────────────────────────────────────────────────

    #[test]
    fn merge_fills_defaults_and_annotates() {
        let record = LogicalRecord {
            source: Some("NHA 12".into()),
            caption: Some("De molen\n---\nold colophon".into()),
            keywords: Some(vec!["molen".into()]),
            ..Default::default()
        };
        let merged = codec().merge(&record);
        assert_eq!(merged.author.as_deref(), Some("Archief Haarlem"));
        assert_eq!(merged.copyright.as_deref(), Some("© Archief Haarlem, bron NHA 12"));
        assert_eq!(
            merged.caption.as_deref(),
            Some("De molen\n---\nBron: NHA 12 https://example.org/?q=NHA+12")
        );
        assert_eq!(merged.keywords, Some(vec!["haarlem".to_string(), "molen".to_string()]));
    }

    #[test]
    fn unparseable_datetime_skips_iptc_dates() {
        let record = LogicalRecord { datetime: Some("sometime in 1890".into()), ..Default::default() };
        let mut embedded = EmbeddedMetadata::default();
        codec().encode(&record, &mut embedded);
        assert!(embedded.iptc.strings(DS_DATE_CREATED).is_empty());
        assert!(embedded.exif.contains(Ifd::Primary, TAG_DATE_TIME));
    }

    // ── files ────────────────────────────────────────────────────────

    #[test]
    fn apply_then_extract_expanded_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(&dir, "p1");
        let record = LogicalRecord {
            author: Some("Frans Hals".into()),
            caption: Some("Grote Markt".into()),
            datetime: Some("1923:05:17 14:30:00".into()),
            keywords: Some(vec!["markt".into(), "tram".into()]),
            location: Some(Location { latitude: Some(52.381), longitude: Some(4.637), altitude: Some(2.0) }),
            source: Some("NHA 53000123".into()),
            writer: Some("dr".into()),
            ..Default::default()
        };
        let codec = codec();
        codec.apply(&path, &record).unwrap();

        let full = codec.extract(&path, true).unwrap();
        let expected = codec.merge(&record);
        assert_eq!(full.author, expected.author);
        assert_eq!(full.caption, expected.caption);
        assert_eq!(full.copyright, expected.copyright);
        assert_eq!(full.credit, expected.credit);
        assert_eq!(full.datetime, expected.datetime);
        assert_eq!(full.keywords, expected.keywords);
        assert_eq!(full.source, expected.source);
        assert_eq!(full.writer, expected.writer);
        let loc = full.location.unwrap();
        assert!((loc.latitude.unwrap() - 52.381).abs() < 1e-6);
        assert!((loc.longitude.unwrap() - 4.637).abs() < 1e-6);
        assert_eq!(loc.altitude, Some(2.0));

        let embedded = read_embedded(&path).unwrap();
        assert_eq!(embedded.iptc.strings(DS_DATE_CREATED), vec!["19230517"]);
        assert_eq!(embedded.iptc.strings(DS_TIME_CREATED), vec!["143000+0000"]);
        assert_eq!(codec.capture_date(&path).unwrap().as_deref(), Some("1923:05:17 14:30:00"));

        let short = codec.extract(&path, false).unwrap();
        assert_eq!(short.caption.as_deref(), Some("Grote Markt"));
        assert_eq!(short.author.as_deref(), Some("Frans Hals"));
        assert_eq!(short.credit, None);
        assert_eq!(short.keywords, Some(vec!["markt".to_string(), "tram".to_string()]));
    }

    #[test]
    fn reapplying_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(&dir, "p2");
        let record = LogicalRecord { caption: Some("Spaarne".into()), ..Default::default() };
        let codec = codec();
        codec.apply(&path, &record).unwrap();
        let first = std::fs::read(&path).unwrap();
        codec.apply(&path, &record).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), first.len());
        assert_eq!(codec.extract(&path, false).unwrap().caption.as_deref(), Some("Spaarne"));
    }

    #[test]
    fn record_without_location_leaves_gps_alone() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(&dir, "p3");
        let codec = codec();
        let with_gps = LogicalRecord {
            location: Some(Location { latitude: Some(1.5), longitude: Some(2.5), altitude: None }),
            ..Default::default()
        };
        codec.apply(&path, &with_gps).unwrap();
        codec.apply(&path, &LogicalRecord::default()).unwrap();
        let loc = codec.extract(&path, true).unwrap().location.unwrap();
        assert_eq!(loc.latitude, Some(1.5));
        assert_eq!(loc.longitude, Some(2.5));
    }
}
