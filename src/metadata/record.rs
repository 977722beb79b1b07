use anyhow::{Context, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::fields::Field;

/// A photo's metadata in the collection's own vocabulary.
///
/// Serialized as YAML with keys in alphabetical order; absent fields are
/// omitted. Loading is lenient: scalars of the wrong type are coerced to text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicalRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub credit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_keywords")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_location")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub writer: Option<String>,
}

impl LogicalRecord {
    /// Value of a text field; `None` for keywords and location.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Author => self.author.as_deref(),
            Field::Caption => self.caption.as_deref(),
            Field::Copyright => self.copyright.as_deref(),
            Field::Credit => self.credit.as_deref(),
            Field::Datetime => self.datetime.as_deref(),
            Field::Source => self.source.as_deref(),
            Field::Writer => self.writer.as_deref(),
            Field::Keywords | Field::Location => None,
        }
    }

    /// Slot of a text field; `None` for keywords and location.
    pub fn text_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::Author => Some(&mut self.author),
            Field::Caption => Some(&mut self.caption),
            Field::Copyright => Some(&mut self.copyright),
            Field::Credit => Some(&mut self.credit),
            Field::Datetime => Some(&mut self.datetime),
            Field::Source => Some(&mut self.source),
            Field::Writer => Some(&mut self.writer),
            Field::Keywords | Field::Location => None,
        }
    }

    /// Load a record file. An empty file is an empty record.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// GPS position in decimal degrees and metres. Components are independent;
/// any may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.altitude.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn part(v: Option<f64>) -> String {
            v.map(|v| v.to_string()).unwrap_or_default()
        }
        write!(
            f,
            "lat={} lng={} alt={}",
            part(self.latitude),
            part(self.longitude),
            part(self.altitude)
        )
    }
}

impl FromStr for Location {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut location = Location::default();
        for token in s.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                anyhow::bail!("Malformed location component {token:?}");
            };
            let value = match value {
                "" | "None" => None,
                v => Some(
                    v.parse::<f64>()
                        .with_context(|| format!("Invalid number in location component {token:?}"))?,
                ),
            };
            match key {
                "lat" => location.latitude = value,
                "lng" | "lon" => location.longitude = value,
                "alt" => location.altitude = value,
                other => log::debug!("Ignoring unknown location component {other:?}"),
            }
        }
        Ok(location)
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ============================================================================
// Lenient field decoding
// ============================================================================

fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        other => serde_yaml::to_string(&other).ok().map(|s| s.trim_end().to_string()),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(scalar_text(value))
}

fn lenient_keywords<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Sequence(items) => Some(items.into_iter().filter_map(scalar_text).collect()),
        scalar => scalar_text(scalar).map(|s| vec![s]),
    })
}

fn lenient_location<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Location>, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match scalar_text(value) {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── YAML format ──────────────────────────────────────────────────

    #[test]
    fn keys_are_alphabetical_and_absent_fields_omitted() {
        let record = LogicalRecord {
            writer: Some("ed".into()),
            author: Some("Jan".into()),
            keywords: Some(vec!["beach".into()]),
            ..Default::default()
        };
        let yaml = record.to_yaml().unwrap();
        assert_eq!(yaml, "author: Jan\nkeywords:\n- beach\nwriter: ed\n");
    }

    #[test]
    fn empty_document_is_empty_record() {
        assert_eq!(LogicalRecord::from_yaml("").unwrap(), LogicalRecord::default());
        assert_eq!(LogicalRecord::from_yaml("{}\n").unwrap(), LogicalRecord::default());
    }

    #[test]
    fn scalars_are_coerced() {
        let record = LogicalRecord::from_yaml("source: 1234\nkeywords: solo\ncaption: true\n").unwrap();
        assert_eq!(record.source.as_deref(), Some("1234"));
        assert_eq!(record.keywords, Some(vec!["solo".to_string()]));
        assert_eq!(record.caption.as_deref(), Some("true"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let record = LogicalRecord::from_yaml("author: A\nrating: 5\n").unwrap();
        assert_eq!(record.author.as_deref(), Some("A"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("meta").join("p1.yaml");
        let record = LogicalRecord {
            caption: Some("line one\nline two".into()),
            location: Some(Location { latitude: Some(52.5), longitude: Some(-1.25), altitude: None }),
            ..Default::default()
        };
        record.save(&path).unwrap();
        assert_eq!(LogicalRecord::load(&path).unwrap(), record);
    }

    // ── location text form ───────────────────────────────────────────

    #[test]
    fn location_display() {
        let loc = Location { latitude: Some(50.5), longitude: Some(-125.25), altitude: Some(12.0) };
        assert_eq!(loc.to_string(), "lat=50.5 lng=-125.25 alt=12");
        assert_eq!(Location::default().to_string(), "lat= lng= alt=");
    }

    #[test]
    fn location_parse() {
        let loc: Location = "lat=52.1 lng=4.3 alt=".parse().unwrap();
        assert_eq!(loc.latitude, Some(52.1));
        assert_eq!(loc.longitude, Some(4.3));
        assert_eq!(loc.altitude, None);
        let loc: Location = "lat=None lng=None alt=None".parse().unwrap();
        assert!(loc.is_empty());
        assert!("lat=north".parse::<Location>().is_err());
    }
}
