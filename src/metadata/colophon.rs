use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// Separates the human-written caption from the generated colophon.
pub const CAPTION_SEP: &str = "\n---\n";

/// Marker that introduced colophons in older captions.
pub const DEFAULT_SOURCE_MARKER: &str = "(Bron:";

/// Values available to `{name}` placeholders in templates.
pub type TemplateFields = BTreeMap<String, String>;

/// The generated trailer appended to every caption on import.
#[derive(Debug, Clone)]
pub struct Colophon {
    template: String,
    pattern: Regex,
}

impl Colophon {
    pub fn new(template: impl Into<String>, source_marker: &str) -> Result<Self> {
        let pattern = format!(
            r"(?s)(?:\s*{}\s*|{}).*$",
            regex::escape(source_marker),
            regex::escape(CAPTION_SEP)
        );
        let pattern = Regex::new(&pattern).context("Invalid colophon source marker")?;
        Ok(Self { template: template.into(), pattern })
    }

    /// The caption without any colophon: everything from the first separator
    /// (or source marker, with its leading whitespace) to the end is removed.
    pub fn strip<'a>(&self, caption: &'a str) -> &'a str {
        match self.pattern.find(caption) {
            Some(m) => &caption[..m.start()],
            None => caption,
        }
    }

    pub fn render(&self, fields: &TemplateFields) -> String {
        interpolate(&self.template, fields)
    }

    /// Strip any existing colophon and append a freshly rendered one.
    pub fn annotate(&self, caption: Option<&str>, fields: &TemplateFields) -> String {
        let body = caption.map(|c| self.strip(c)).unwrap_or_default();
        format!("{body}{CAPTION_SEP}{}", self.render(fields))
    }
}

/// Replace `{name}` placeholders. `{{` and `}}` are literal braces; unknown
/// names render as empty text.
pub fn interpolate(template: &str, fields: &TemplateFields) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(at) = rest.find(['{', '}']) {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
        } else {
            let Some(close) = tail.find('}') else {
                out.push_str(tail);
                rest = "";
                break;
            };
            let name = tail[1..close].split([':', '!']).next().unwrap_or_default().trim();
            match fields.get(name) {
                Some(value) => out.push_str(value),
                None => log::debug!("Template placeholder {{{name}}} has no value"),
            }
            rest = &tail[close + 1..];
        }
    }
    out.push_str(rest);
    out
}

/// Form encoding of a value for use inside a URL query (spaces become `+`).
pub fn quote_plus(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
