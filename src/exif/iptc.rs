use super::decode_text;

pub const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
const RESOURCE_IPTC: u16 = 0x0404;
// MD5 of the IIM block; stale as soon as we rewrite it.
const RESOURCE_IPTC_DIGEST: u16 = 0x0425;

const TAG_MARKER: u8 = 0x1C;
const RECORD_ENVELOPE: u8 = 1;
const RECORD_APPLICATION: u8 = 2;
const DS_CODED_CHARACTER_SET: u8 = 90;
const DS_RECORD_VERSION: u8 = 0;
const UTF8_MARKER: &[u8] = b"\x1b%G";
const IIM_VERSION: [u8; 2] = [0x00, 0x04];

// Application record (2:xx) dataset numbers
pub const DS_KEYWORDS: u8 = 25;
pub const DS_DATE_CREATED: u8 = 55;
pub const DS_TIME_CREATED: u8 = 60;
pub const DS_DIGITIZATION_DATE: u8 = 62;
pub const DS_DIGITIZATION_TIME: u8 = 63;
pub const DS_BYLINE: u8 = 80;
pub const DS_CREDIT: u8 = 110;
pub const DS_SOURCE: u8 = 115;
pub const DS_COPYRIGHT: u8 = 116;
pub const DS_CAPTION: u8 = 120;
pub const DS_WRITER: u8 = 122;

/// One IIM dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub record: u8,
    pub number: u8,
    pub data: Vec<u8>,
}

/// IPTC-IIM datasets in file order. Datasets this crate does not manage are
/// carried through unchanged.
#[derive(Debug, Clone, Default)]
pub struct Iptc {
    datasets: Vec<Dataset>,
    modified: bool,
}

impl Iptc {
    /// Parse a raw IIM stream. Parsing stops at the first malformed dataset.
    pub fn parse(data: &[u8]) -> Self {
        let mut datasets = Vec::new();
        let mut pos = 0;
        while pos + 5 <= data.len() && data[pos] == TAG_MARKER {
            let record = data[pos + 1];
            let number = data[pos + 2];
            let short_len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]);
            let (len, header) = if short_len & 0x8000 != 0 {
                // Extended dataset: the low bits give the size of the length field.
                let width = (short_len & 0x7FFF) as usize;
                let Some(field) = data.get(pos + 5..pos + 5 + width).filter(|_| width <= 4) else {
                    log::warn!("Malformed extended IPTC dataset {record}:{number}");
                    break;
                };
                let len = field.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
                (len, 5 + width)
            } else {
                (short_len as usize, 5)
            };
            let start = pos + header;
            let Some(value) = data.get(start..start + len) else {
                log::warn!("IPTC dataset {record}:{number} extends beyond its block");
                break;
            };
            datasets.push(Dataset { record, number, data: value.to_vec() });
            pos = start + len;
        }
        Self { datasets, modified: false }
    }

    /// Parse the IIM resource of an APP13 segment.
    pub fn from_app13(contents: &[u8]) -> Self {
        resources(contents)
            .into_iter()
            .find(|r| r.id == RESOURCE_IPTC)
            .map(|r| Self::parse(r.data))
            .unwrap_or_default()
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// All values of an application-record dataset, in file order.
    pub fn strings(&self, number: u8) -> Vec<String> {
        self.datasets
            .iter()
            .filter(|d| d.record == RECORD_APPLICATION && d.number == number)
            .map(|d| decode_text(&d.data))
            .collect()
    }

    /// Replace every occurrence of an application-record dataset. An empty
    /// slice removes the dataset.
    pub fn set(&mut self, number: u8, values: &[String]) {
        let first = self
            .datasets
            .iter()
            .position(|d| d.record == RECORD_APPLICATION && d.number == number);
        self.datasets
            .retain(|d| !(d.record == RECORD_APPLICATION && d.number == number));

        let at = first.unwrap_or_else(|| {
            self.datasets
                .iter()
                .position(|d| (d.record, d.number) > (RECORD_APPLICATION, number))
                .unwrap_or(self.datasets.len())
        });
        let new = values.iter().map(|v| Dataset {
            record: RECORD_APPLICATION,
            number,
            data: v.as_bytes().to_vec(),
        });
        self.datasets.splice(at..at, new);
        self.ensure_headers();
        self.modified = true;
    }

    /// Values are written as UTF-8, so declare it (1:90) and make sure the
    /// record version (2:0) is present.
    fn ensure_headers(&mut self) {
        match self
            .datasets
            .iter_mut()
            .find(|d| d.record == RECORD_ENVELOPE && d.number == DS_CODED_CHARACTER_SET)
        {
            Some(charset) => charset.data = UTF8_MARKER.to_vec(),
            None => {
                let at = self
                    .datasets
                    .iter()
                    .position(|d| (d.record, d.number) > (RECORD_ENVELOPE, DS_CODED_CHARACTER_SET))
                    .unwrap_or(self.datasets.len());
                self.datasets.insert(
                    at,
                    Dataset {
                        record: RECORD_ENVELOPE,
                        number: DS_CODED_CHARACTER_SET,
                        data: UTF8_MARKER.to_vec(),
                    },
                );
            }
        }

        let has_version = self
            .datasets
            .iter()
            .any(|d| d.record == RECORD_APPLICATION && d.number == DS_RECORD_VERSION);
        if !has_version {
            let at = self
                .datasets
                .iter()
                .position(|d| d.record >= RECORD_APPLICATION)
                .unwrap_or(self.datasets.len());
            self.datasets.insert(
                at,
                Dataset {
                    record: RECORD_APPLICATION,
                    number: DS_RECORD_VERSION,
                    data: IIM_VERSION.to_vec(),
                },
            );
        }
    }

    /// Serialize to a raw IIM stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for d in &self.datasets {
            out.extend_from_slice(&[TAG_MARKER, d.record, d.number]);
            if d.data.len() <= 0x7FFF {
                out.extend_from_slice(&(d.data.len() as u16).to_be_bytes());
            } else {
                out.extend_from_slice(&0x8004u16.to_be_bytes());
                out.extend_from_slice(&(d.data.len() as u32).to_be_bytes());
            }
            out.extend_from_slice(&d.data);
        }
        out
    }
}

// ============================================================================
// Photoshop image resources (APP13)
// ============================================================================

/// One 8BIM image resource, borrowed from its segment.
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    pub id: u16,
    pub data: &'a [u8],
    /// The whole resource including header and padding.
    pub raw: &'a [u8],
}

/// Walk the 8BIM resources of an APP13 segment.
pub fn resources(contents: &[u8]) -> Vec<Resource<'_>> {
    let mut found = Vec::new();
    if !contents.starts_with(PHOTOSHOP_HEADER) {
        return found;
    }
    let mut pos = PHOTOSHOP_HEADER.len();
    while pos + 12 <= contents.len() {
        if &contents[pos..pos + 4] != RESOURCE_SIGNATURE {
            break;
        }
        let id = u16::from_be_bytes([contents[pos + 4], contents[pos + 5]]);
        // Pascal name: length byte + name, padded to even
        let name_len = contents[pos + 6] as usize;
        let name_padded = if (name_len + 1) % 2 == 0 { name_len + 1 } else { name_len + 2 };
        let size_at = pos + 6 + name_padded;
        let Some(size) = contents.get(size_at..size_at + 4) else {
            break;
        };
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        let data_start = size_at + 4;
        let data_end = data_start + size;
        if data_end > contents.len() {
            log::warn!("Truncated 8BIM resource 0x{id:04X}");
            break;
        }
        let padded_end = (data_end + size % 2).min(contents.len());
        found.push(Resource {
            id,
            data: &contents[data_start..data_end],
            raw: &contents[pos..padded_end],
        });
        pos = padded_end;
    }
    found
}

/// Build APP13 contents: existing resources are preserved, the IIM resource is
/// replaced and its digest dropped.
pub fn build_app13(existing: Option<&[u8]>, iim: &[u8]) -> Vec<u8> {
    let mut result = PHOTOSHOP_HEADER.to_vec();

    if let Some(contents) = existing {
        for resource in resources(contents) {
            if resource.id != RESOURCE_IPTC && resource.id != RESOURCE_IPTC_DIGEST {
                result.extend_from_slice(resource.raw);
            }
        }
    }

    if !iim.is_empty() {
        result.extend_from_slice(RESOURCE_SIGNATURE);
        result.extend_from_slice(&RESOURCE_IPTC.to_be_bytes());
        result.extend_from_slice(&[0x00, 0x00]); // empty pascal name, padded
        result.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        result.extend_from_slice(iim);
        if iim.len() % 2 != 0 {
            result.push(0x00);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: u16, data: &[u8]) -> Vec<u8> {
        let mut out = RESOURCE_SIGNATURE.to_vec();
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 != 0 {
            out.push(0);
        }
        out
    }

    fn dataset(record: u8, number: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![TAG_MARKER, record, number];
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
        out.extend_from_slice(data);
        out
    }

    // ── IIM datasets ─────────────────────────────────────────────────

    #[test]
    fn parse_repeated_keywords() {
        let mut raw = dataset(2, 25, b"beach");
        raw.extend(dataset(2, 25, b"sunset"));
        raw.extend(dataset(2, 120, b"caption"));
        let iptc = Iptc::parse(&raw);
        assert_eq!(iptc.strings(DS_KEYWORDS), vec!["beach", "sunset"]);
        assert_eq!(iptc.strings(DS_CAPTION), vec!["caption"]);
        assert!(iptc.strings(DS_SOURCE).is_empty());
    }

    #[test]
    fn parse_stops_at_truncated_dataset() {
        let mut raw = dataset(2, 80, b"Author");
        raw.extend_from_slice(&[TAG_MARKER, 2, 120, 0x00, 0x40, b'x']);
        let iptc = Iptc::parse(&raw);
        assert_eq!(iptc.datasets().len(), 1);
    }

    #[test]
    fn latin1_values_are_decoded() {
        let raw = dataset(2, 80, &[b'J', 0xF6, b'r', b'g']);
        assert_eq!(Iptc::parse(&raw).strings(DS_BYLINE), vec!["Jörg"]);
    }

    #[test]
    fn set_replaces_and_preserves_others() {
        let mut raw = dataset(2, 5, b"object name");
        raw.extend(dataset(2, 25, b"old"));
        raw.extend(dataset(2, 120, b"caption"));
        let mut iptc = Iptc::parse(&raw);
        iptc.set(DS_KEYWORDS, &["a".to_string(), "b".to_string()]);
        assert!(iptc.is_modified());

        let reparsed = Iptc::parse(&iptc.to_bytes());
        assert_eq!(reparsed.strings(DS_KEYWORDS), vec!["a", "b"]);
        assert_eq!(reparsed.strings(5), vec!["object name"]);
        assert_eq!(reparsed.strings(DS_CAPTION), vec!["caption"]);
        let order: Vec<(u8, u8)> = reparsed.datasets().iter().map(|d| (d.record, d.number)).collect();
        assert_eq!(order, vec![(1, 90), (2, 0), (2, 5), (2, 25), (2, 25), (2, 120)]);
    }

    #[test]
    fn set_empty_removes_dataset() {
        let mut iptc = Iptc::parse(&dataset(2, 25, b"gone"));
        iptc.set(DS_KEYWORDS, &[]);
        assert!(iptc.strings(DS_KEYWORDS).is_empty());
    }

    #[test]
    fn utf8_marker_is_declared() {
        let mut iptc = Iptc::default();
        iptc.set(DS_CAPTION, &["Zürich".to_string()]);
        let charset = iptc
            .datasets()
            .iter()
            .find(|d| d.record == 1 && d.number == 90)
            .unwrap();
        assert_eq!(charset.data, UTF8_MARKER);
        assert_eq!(Iptc::parse(&iptc.to_bytes()).strings(DS_CAPTION), vec!["Zürich"]);
    }

    #[test]
    fn long_values_use_extended_length() {
        let caption = "x".repeat(40_000);
        let mut iptc = Iptc::default();
        iptc.set(DS_CAPTION, &[caption.clone()]);
        assert_eq!(Iptc::parse(&iptc.to_bytes()).strings(DS_CAPTION), vec![caption]);
    }

    // ── 8BIM resources ───────────────────────────────────────────────

    #[test]
    fn build_app13_keeps_other_resources_and_drops_digest() {
        let mut contents = PHOTOSHOP_HEADER.to_vec();
        contents.extend(resource(0x03ED, b"resolution"));
        contents.extend(resource(RESOURCE_IPTC, &dataset(2, 25, b"old")));
        contents.extend(resource(RESOURCE_IPTC_DIGEST, &[0u8; 16]));

        let iim = dataset(2, 25, b"new");
        let rebuilt = build_app13(Some(&contents), &iim);
        let ids: Vec<u16> = resources(&rebuilt).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0x03ED, RESOURCE_IPTC]);
        assert_eq!(Iptc::from_app13(&rebuilt).strings(DS_KEYWORDS), vec!["new"]);
    }

    #[test]
    fn odd_sized_resources_are_padded() {
        let iim = dataset(2, 80, b"abc");
        assert_eq!(iim.len() % 2, 0);
        let odd = dataset(2, 80, b"ab");
        let built = build_app13(None, &odd);
        assert_eq!(built.len() % 2, 0);
        assert_eq!(Iptc::from_app13(&built).strings(DS_BYLINE), vec!["ab"]);
    }
}
