//! Which photos need work: file timestamps compared against each other and
//! against the collection's last-synced marker.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const MARKER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Decides per photo whether import, export or sync is needed.
///
/// `force` and `single` (one named photo targeted) both bypass every check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    force: bool,
    single: bool,
    last_synced: Option<NaiveDateTime>,
}

impl ChangeDetector {
    pub fn new(force: bool, single: bool) -> Self {
        Self { force, single, last_synced: None }
    }

    pub fn with_last_synced(mut self, last_synced: Option<NaiveDateTime>) -> Self {
        self.last_synced = last_synced;
        self
    }

    pub fn is_forced(&self) -> bool {
        self.force || self.single
    }

    /// The metadata file exists and is newer than the image.
    pub fn needs_import(&self, meta_path: &Path, image_path: &Path) -> Result<bool> {
        if self.is_forced() {
            return Ok(true);
        }
        if !meta_path.exists() {
            return Ok(false);
        }
        Ok(modified(meta_path)? > modified(image_path)?)
    }

    /// The export target is missing or older than the image.
    pub fn needs_export(&self, image_path: &Path, out_path: &Path) -> Result<bool> {
        if self.is_forced() || !out_path.exists() {
            return Ok(true);
        }
        Ok(modified(image_path)? > modified(out_path)?)
    }

    /// The image changed after the last sync (always true when never synced).
    pub fn needs_sync(&self, image_path: &Path) -> Result<bool> {
        if self.is_forced() {
            return Ok(true);
        }
        match self.last_synced {
            None => Ok(true),
            Some(at) => Ok(local_time(modified(image_path)?) > at),
        }
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", path.display()))
}

fn local_time(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// The collection's "last synced with Flickr" timestamp, stored as ISO local time.
#[derive(Debug, Clone)]
pub struct SyncMarker {
    path: PathBuf,
}

impl SyncMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the collection was never synced.
    pub fn load(&self) -> Result<Option<NaiveDateTime>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let text = text.trim();
        let at = NaiveDateTime::parse_from_str(text, MARKER_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .with_context(|| format!("Unreadable timestamp {text:?} in {}", self.path.display()))?;
        Ok(Some(at))
    }

    pub fn store(&self, at: NaiveDateTime) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, at.format(MARKER_FORMAT).to_string())
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
