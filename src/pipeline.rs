use anyhow::{Context, Result};
use chrono::Local;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::changes::ChangeDetector;
use crate::config::{CollectionConfig, CollectionPaths};
use crate::metadata::{LogicalRecord, MetadataCodec};
use crate::mutator::Mutator;
use crate::planner::{PlanMode, ReconciliationPlan};
use crate::remote::Remote;
use crate::report::{PhotoCounts, RunReport};
use crate::snapshot::{FetchOptions, RemoteSnapshot};

/// What a run does. Resolved from the command line.
///
/// # Example
///
/// ```rust
/// use updatr::pipeline::Command;
///
/// let command = Command::AlbumSync { albums: Some(vec!["sunset".into()]) };
/// assert_eq!(command.name(), "albumsync");
/// assert!(command.needs_remote());
/// assert!(!Command::ImportMeta { force: false }.needs_remote());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write changed `metadata/<name>.yaml` records into the photos.
    ImportMeta { force: bool },
    /// Export every photo's record; `full` writes the expanded form.
    ExportMeta { full: bool },
    /// Refresh `metadatafull/<name>.yaml` for changed photos.
    ExportMetaFull { force: bool },
    /// Import, export-full, then push changed photos and their memberships.
    Sync { force: bool },
    /// Put albums in capture-date order.
    AlbumSort { albums: Option<Vec<String>> },
    /// Reconcile album memberships of every photo, without uploading.
    AlbumSync { albums: Option<Vec<String>> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ImportMeta { .. } => "importmeta",
            Self::ExportMeta { .. } => "exportmeta",
            Self::ExportMetaFull { .. } => "exportmetafull",
            Self::Sync { .. } => "sync",
            Self::AlbumSort { .. } => "albumsort",
            Self::AlbumSync { .. } => "albumsync",
        }
    }

    pub fn needs_remote(&self) -> bool {
        matches!(self, Self::Sync { .. } | Self::AlbumSort { .. } | Self::AlbumSync { .. })
    }
}

/// A photo of the collection; `name` is the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub name: String,
    pub path: PathBuf,
}

/// The `*.jpg` files directly inside `dir`, sorted by name.
pub fn collect_photos(dir: &Path) -> Result<Vec<Photo>> {
    if !dir.is_dir() {
        anyhow::bail!("Photo directory not found: {}", dir.display());
    }
    let mut photos: Vec<Photo> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_jpeg(e.path()))
        .filter_map(|e| {
            let name = e.path().file_stem()?.to_str()?.to_string();
            Some(Photo { name, path: e.into_path() })
        })
        .collect();
    photos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(photos)
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg"))
        .unwrap_or(false)
}

/// A collection on disk: its layout, config and photos.
#[derive(Debug, Clone)]
pub struct Collection {
    pub paths: CollectionPaths,
    pub config: CollectionConfig,
    all_photos: Vec<Photo>,
    selected: Option<usize>,
}

impl Collection {
    /// Load the config and list the photos; `selected` narrows the run to a
    /// single photo, which must exist.
    pub fn open(paths: CollectionPaths, selected: Option<&str>) -> Result<Self> {
        let config = CollectionConfig::load(&paths.config_file())?;
        let all_photos = collect_photos(&paths.photos_dir())?;
        log::info!("Collection {}: {} photos", paths.source, all_photos.len());
        let selected = match selected {
            Some(name) => match all_photos.iter().position(|p| p.name == name) {
                Some(index) => {
                    log::info!("Selected {name}");
                    Some(index)
                }
                None => anyhow::bail!("Photo {name} not found in {}", paths.photos_dir().display()),
            },
            None => None,
        };
        Ok(Self { paths, config, all_photos, selected })
    }

    /// The photos a run works on: the selected one, or all of them.
    pub fn photos(&self) -> &[Photo] {
        match self.selected {
            Some(index) => std::slice::from_ref(&self.all_photos[index]),
            None => &self.all_photos,
        }
    }

    /// Every photo in the collection, regardless of selection.
    pub fn all_photos(&self) -> &[Photo] {
        &self.all_photos
    }

    /// A single named photo is targeted.
    pub fn is_single(&self) -> bool {
        self.selected.is_some()
    }
}

/// Runs commands against one collection.
pub struct Updatr {
    collection: Collection,
    codec: MetadataCodec,
    remote: Option<Remote>,
    settle_attempts: u32,
}

impl Updatr {
    pub fn new(collection: Collection) -> Result<Self> {
        let codec = MetadataCodec::from_config(&collection.config)?;
        Ok(Self { collection, codec, remote: None, settle_attempts: 1 })
    }

    /// Attach the remote service; needed by `sync`, `albumsort` and `albumsync`.
    pub fn with_remote(mut self, remote: Remote, settle_attempts: u32) -> Self {
        self.remote = Some(remote);
        self.settle_attempts = settle_attempts;
        self
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn codec(&self) -> &MetadataCodec {
        &self.codec
    }

    fn remote(&self) -> Result<&Remote> {
        self.remote.as_ref().context("No remote service configured")
    }

    pub async fn run(&self, command: &Command) -> Result<RunReport> {
        log::info!("Running {} on {}", command.name(), self.collection.paths.source);
        let mut report = RunReport::default();
        match command {
            Command::ImportMeta { force } => self.import_meta(*force, &mut report)?,
            Command::ExportMeta { full } => self.export_meta(*full, &mut report)?,
            Command::ExportMetaFull { force } => self.export_meta_full(*force, &mut report)?,
            Command::Sync { force } => self.sync(*force, &mut report).await?,
            Command::AlbumSort { albums } => self.album_sort(albums.as_deref(), &mut report).await?,
            Command::AlbumSync { albums } => self.album_sync(albums.as_deref(), &mut report).await?,
        }
        Ok(report)
    }

    fn detector(&self, force: bool) -> ChangeDetector {
        ChangeDetector::new(force, self.collection.is_single())
    }

    fn import_meta(&self, force: bool, report: &mut RunReport) -> Result<()> {
        let detector = self.detector(force);
        let mut counts = PhotoCounts::default();
        for photo in self.collection.photos() {
            let meta = self.collection.paths.metadata_file(&photo.name);
            if !detector.needs_import(&meta, &photo.path)? {
                counts.record(false);
                continue;
            }
            let record = if meta.exists() { LogicalRecord::load(&meta)? } else { LogicalRecord::default() };
            log::info!("Importing metadata into {}", photo.name);
            self.codec
                .apply(&photo.path, &record)
                .with_context(|| format!("Failed to write metadata into {}", photo.path.display()))?;
            counts.record(true);
        }
        report.imported = Some(counts);
        Ok(())
    }

    fn export_meta(&self, full: bool, report: &mut RunReport) -> Result<()> {
        let mut counts = PhotoCounts::default();
        for photo in self.collection.photos() {
            let record = self.codec.extract(&photo.path, full)?;
            record.save(&self.collection.paths.export_file(&photo.name, full))?;
            counts.record(true);
        }
        report.exported = Some(counts);
        Ok(())
    }

    fn export_meta_full(&self, force: bool, report: &mut RunReport) -> Result<()> {
        let detector = self.detector(force);
        let mut counts = PhotoCounts::default();
        for photo in self.collection.photos() {
            let out = self.collection.paths.full_metadata_file(&photo.name);
            if !detector.needs_export(&photo.path, &out)? {
                counts.record(false);
                continue;
            }
            log::debug!("Exporting {}", out.display());
            self.codec.extract(&photo.path, true)?.save(&out)?;
            counts.record(true);
        }
        report.exported = Some(counts);
        Ok(())
    }

    /// Full keyword list of every photo, selected or not.
    fn keyword_sets(&self) -> Result<Vec<(String, Vec<String>)>> {
        self.collection
            .all_photos()
            .iter()
            .map(|photo| {
                let record = self.codec.extract(&photo.path, true)?;
                Ok::<_, anyhow::Error>((photo.name.clone(), record.keywords.unwrap_or_default()))
            })
            .collect()
    }

    /// Lower-cased album titles a run may touch: every keyword in use plus
    /// the default keywords.
    fn vocabulary(&self, keyword_sets: &[(String, Vec<String>)]) -> BTreeSet<String> {
        keyword_sets
            .iter()
            .flat_map(|(_, keywords)| keywords.iter())
            .chain(self.codec.default_keywords())
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }

    async fn sync(&self, force: bool, report: &mut RunReport) -> Result<()> {
        let single = self.collection.is_single();
        self.import_meta(force, report)?;
        self.export_meta_full(force, report)?;

        let marker = self.collection.paths.sync_marker();
        let last_synced = if single { None } else { marker.load()? };
        let detector = self.detector(force).with_last_synced(last_synced);
        // Images changed after this point are picked up by the next run.
        let started = Local::now().naive_local();

        let mut updates: Vec<(&Photo, LogicalRecord)> = Vec::new();
        for photo in self.collection.photos() {
            if detector.needs_sync(&photo.path)? {
                updates.push((photo, self.codec.extract(&photo.path, true)?));
            }
        }
        let mut synced = PhotoCounts { unchanged: self.collection.photos().len() - updates.len(), updated: 0 };

        if updates.is_empty() {
            log::info!("No photos changed since the last sync");
        } else {
            let remote = self.remote()?;
            let keyword_sets = self.keyword_sets()?;
            let vocabulary = self.vocabulary(&keyword_sets);
            let options = FetchOptions { vocabulary: &vocabulary, scope: None, contents: true, touch_main: true };
            let mut snapshot =
                RemoteSnapshot::fetch(remote, &self.collection.config.album_name, &options).await?;

            let mut mutator = Mutator::new(remote, &mut snapshot, self.settle_attempts);
            for (photo, record) in &updates {
                mutator.put_photo(&photo.name, &photo.path, record).await?;
                synced.updated += 1;
            }

            let plan = ReconciliationPlan::build(
                mutator.snapshot(),
                self.codec.default_keywords(),
                updates
                    .iter()
                    .map(|(photo, record)| (photo.name.as_str(), record.keywords.as_deref().unwrap_or_default())),
                PlanMode::MetadataChanged,
            );
            report.memberships = Some(PhotoCounts { unchanged: plan.unchanged, updated: plan.updated });
            mutator.apply(&plan, report).await?;
        }
        report.synced = Some(synced);

        if !single {
            marker.store(started)?;
        }
        Ok(())
    }

    async fn album_sync(&self, albums: Option<&[String]>, report: &mut RunReport) -> Result<()> {
        let remote = self.remote()?;
        let keyword_sets = self.keyword_sets()?;
        let vocabulary = self.vocabulary(&keyword_sets);
        let scope: Option<BTreeSet<String>> = albums.map(|titles| titles.iter().cloned().collect());
        let options = FetchOptions { vocabulary: &vocabulary, scope: scope.as_ref(), contents: true, touch_main: false };
        let mut snapshot = RemoteSnapshot::fetch(remote, &self.collection.config.album_name, &options).await?;

        let candidates: BTreeSet<&str> = self.collection.photos().iter().map(|p| p.name.as_str()).collect();
        let plan = ReconciliationPlan::build(
            &snapshot,
            self.codec.default_keywords(),
            keyword_sets
                .iter()
                .filter(|(name, _)| candidates.contains(name.as_str()))
                .map(|(name, keywords)| (name.as_str(), keywords.as_slice())),
            PlanMode::MembershipOnly,
        );
        report.memberships = Some(PhotoCounts { unchanged: plan.unchanged, updated: plan.updated });
        if plan.is_empty() {
            log::info!("Album memberships are up to date");
            return Ok(());
        }
        Mutator::new(remote, &mut snapshot, self.settle_attempts).apply(&plan, report).await
    }

    async fn album_sort(&self, albums: Option<&[String]>, report: &mut RunReport) -> Result<()> {
        let remote = self.remote()?;
        let keyword_sets = self.keyword_sets()?;
        let vocabulary = self.vocabulary(&keyword_sets);
        let scope: Option<BTreeSet<String>> = albums.map(|titles| titles.iter().cloned().collect());
        let options = FetchOptions { vocabulary: &vocabulary, scope: scope.as_ref(), contents: false, touch_main: false };
        let mut snapshot = RemoteSnapshot::fetch(remote, &self.collection.config.album_name, &options).await?;

        let titles: Vec<String> = match albums {
            Some(titles) => titles.to_vec(),
            None => snapshot.albums().map(|a| a.title.clone()).collect(),
        };
        Mutator::new(remote, &mut snapshot, self.settle_attempts).sort_albums(&titles, report).await
    }
}
