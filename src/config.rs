use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::changes::SyncMarker;
use crate::metadata::LogicalRecord;
use crate::metadata::colophon::DEFAULT_SOURCE_MARKER;

/// Per-collection settings, read from `<base>/<source>/config.yaml`.
///
/// # Example
///
/// ```rust
/// use updatr::config::CollectionConfig;
///
/// let config = CollectionConfig::from_yaml(r#"
/// albumName: Haarlem in beeld
/// colofon: "Bron: {source}"
/// metaDefaults:
///   author: Noord-Hollands Archief
///   copyright: "© {author}"
///   keywords: [haarlem]
/// "#).unwrap();
/// assert_eq!(config.album_name, "Haarlem in beeld");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// Values every photo falls back to; omitted from exported records.
    pub meta_defaults: LogicalRecord,
    /// Template for the caption trailer. Placeholders are record field names
    /// plus `sourceAsUrl`.
    pub colofon: String,
    /// Title of the album that holds every photo of the collection.
    pub album_name: String,
    /// Marker that started colophons written by older versions.
    #[serde(default = "default_source_marker")]
    pub source_marker: String,
}

fn default_source_marker() -> String {
    DEFAULT_SOURCE_MARKER.to_string()
}

/// Flickr account settings, read from `<local>/flickr.yaml`.
///
/// OAuth tokens must have been obtained beforehand; they are not requested
/// interactively.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(alias = "flickrKey")]
    pub api_key: String,
    #[serde(alias = "flickrSecret")]
    pub api_secret: String,
    #[serde(alias = "flickrUserId")]
    pub user_id: String,
    #[serde(default)]
    pub oauth_token: String,
    #[serde(default)]
    pub oauth_token_secret: String,
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// Delays that keep the run inside Flickr's rate limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PacingConfig {
    /// Wait before every remote call.
    pub call_delay_ms: u64,
    /// Wait before reading back albums that were just modified.
    pub settle_delay_secs: u64,
    /// Read-backs attempted before sorting a stale album listing anyway.
    pub settle_attempts: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { call_delay_ms: 200, settle_delay_secs: 10, settle_attempts: 3 }
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        anyhow::bail!("No yaml file found: {}", path.display());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

impl CollectionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path)?;
        config.validate().with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents).context("Failed to parse collection config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.album_name.trim().is_empty() {
            anyhow::bail!("albumName must not be empty");
        }
        if self.source_marker.is_empty() {
            anyhow::bail!("sourceMarker must not be empty");
        }
        Ok(())
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path)?;
        for (key, value) in [("flickrKey", &config.api_key), ("flickrSecret", &config.api_secret)] {
            if value.trim().is_empty() {
                anyhow::bail!("{key} must not be empty in {}", path.display());
            }
        }
        Ok(config)
    }
}

/// Where a collection's files live.
///
/// ```text
/// <base>/<source>/config.yaml          collection config
/// <base>/<source>/photos/<name>.jpg    images
/// <base>/<source>/metadata/            records to import
/// <base>/<source>/metadatafull/        expanded records (exportmetafull)
/// <local>/flickr.yaml                  service config
/// <local>/<source>/metadata[x]/        exportmeta output
/// <local>/<source>-flickrupdated.txt   last-synced marker
/// ```
#[derive(Debug, Clone)]
pub struct CollectionPaths {
    pub source: String,
    pub root: PathBuf,
    pub local: PathBuf,
}

impl CollectionPaths {
    pub fn new(base: &Path, local: &Path, source: &str) -> Self {
        Self {
            source: source.to_string(),
            root: base.join(source),
            local: local.to_path_buf(),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn service_config_file(&self) -> PathBuf {
        self.local.join("flickr.yaml")
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.root.join("photos")
    }

    pub fn image_file(&self, name: &str) -> PathBuf {
        self.photos_dir().join(format!("{name}.jpg"))
    }

    pub fn metadata_file(&self, name: &str) -> PathBuf {
        self.root.join("metadata").join(format!("{name}.yaml"))
    }

    pub fn full_metadata_file(&self, name: &str) -> PathBuf {
        self.root.join("metadatafull").join(format!("{name}.yaml"))
    }

    /// Destination of `exportmeta`; `full` selects the expanded variant.
    pub fn export_file(&self, name: &str, full: bool) -> PathBuf {
        let dir = if full { "metadatax" } else { "metadata" };
        self.local.join(&self.source).join(dir).join(format!("{name}.yaml"))
    }

    pub fn sync_marker(&self) -> SyncMarker {
        SyncMarker::new(self.local.join(format!("{}-flickrupdated.txt", self.source)))
    }
}
