//! Applies photo updates and membership plans to the service, then puts the
//! touched albums back in capture-date order.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

use crate::metadata::LogicalRecord;
use crate::planner::ReconciliationPlan;
use crate::remote::{Remote, RemotePhoto};
use crate::report::RunReport;
use crate::snapshot::{RemoteSnapshot, fetch_members};

/// Members ordered by capture date, undated photos first. Stable for equal
/// dates.
fn by_capture_date(mut photos: Vec<RemotePhoto>) -> Vec<RemotePhoto> {
    photos.sort_by(|a, b| a.date_taken.cmp(&b.date_taken));
    photos
}

pub struct Mutator<'a> {
    remote: &'a Remote,
    snapshot: &'a mut RemoteSnapshot,
    settle_attempts: u32,
}

impl<'a> Mutator<'a> {
    pub fn new(remote: &'a Remote, snapshot: &'a mut RemoteSnapshot, settle_attempts: u32) -> Self {
        Self { remote, snapshot, settle_attempts }
    }

    pub fn snapshot(&self) -> &RemoteSnapshot {
        self.snapshot
    }

    /// Push a photo's bytes, title, description and tags. A photo the main
    /// album does not know yet is uploaded and added to it.
    pub async fn put_photo(&mut self, name: &str, path: &Path, record: &LogicalRecord) -> Result<()> {
        let id = match self.snapshot.photo_id(name).map(str::to_string) {
            Some(id) => {
                log::info!("Replacing {name}");
                self.remote
                    .replace_photo(&id, path)
                    .await
                    .with_context(|| format!("Failed to replace {name}"))?;
                id
            }
            None => {
                log::info!("Uploading {name}");
                let id = self
                    .remote
                    .upload_photo(path, name)
                    .await
                    .with_context(|| format!("Failed to upload {name}"))?;
                self.join_main_album(name, &id).await?;
                id
            }
        };

        let description = record.caption.as_deref().unwrap_or_default();
        self.remote
            .set_meta(&id, name, description)
            .await
            .with_context(|| format!("Failed to set title and description of {name}"))?;
        let tags = record.keywords.as_deref().unwrap_or_default();
        self.remote
            .set_tags(&id, tags)
            .await
            .with_context(|| format!("Failed to set tags of {name}"))?;
        Ok(())
    }

    async fn join_main_album(&mut self, name: &str, photo_id: &str) -> Result<()> {
        let main = self.snapshot.main_title().to_string();
        let joined = match self.snapshot.main_album().map(|a| a.id.clone()) {
            Some(album_id) => self.remote.add_photo(&album_id, photo_id).await,
            None => {
                log::info!("Creating album {main:?}");
                self.remote.create_album(&main, photo_id).await.map(|album_id| {
                    self.snapshot.insert_album(&album_id, &main, photo_id);
                })
            }
        };
        joined.with_context(|| format!("Failed to add {name} to {main:?}"))?;
        self.snapshot.register_photo(name, photo_id);
        self.snapshot.touch(&main);
        Ok(())
    }

    /// Additions, then deletions, then a settle wait and a re-sort of every
    /// touched album.
    pub async fn apply(&mut self, plan: &ReconciliationPlan, report: &mut RunReport) -> Result<()> {
        for (title, names) in &plan.additions {
            for name in names {
                self.add(title, name, report).await?;
            }
        }

        for (title, names) in &plan.deletions {
            let Some(album_id) = self.snapshot.album(title).map(|a| a.id.clone()) else {
                log::warn!("Album {title:?} does not exist, skipping {} removals", names.len());
                report.album_mut(title).skipped += names.len();
                continue;
            };
            for name in names {
                let Some(photo_id) = self.snapshot.photo_id(name).map(str::to_string) else {
                    log::warn!("{name} is not in {:?}, cannot remove it from {title:?}", self.snapshot.main_title());
                    report.album_mut(title).skipped += 1;
                    continue;
                };
                log::info!("Removing {name} from {title:?}");
                self.remote
                    .remove_photo(&album_id, &photo_id)
                    .await
                    .with_context(|| format!("Failed to remove {name} from {title:?}"))?;
                self.snapshot.remove_member(title, name);
                report.album_mut(title).removed += 1;
            }
        }

        for title in &plan.touched {
            self.snapshot.touch(title);
        }

        let touched = self.snapshot.touched();
        if touched.is_empty() {
            return Ok(());
        }
        self.remote.settle(0).await;
        for title in touched {
            self.resort(&title, report).await?;
        }
        Ok(())
    }

    async fn add(&mut self, title: &str, name: &str, report: &mut RunReport) -> Result<()> {
        let Some(photo_id) = self.snapshot.photo_id(name).map(str::to_string) else {
            log::warn!("{name} is not in {:?}, cannot add it to {title:?}", self.snapshot.main_title());
            report.album_mut(title).skipped += 1;
            return Ok(());
        };

        match self.snapshot.album(title).map(|a| a.id.clone()) {
            Some(album_id) => {
                log::info!("Adding {name} to {title:?}");
                self.remote
                    .add_photo(&album_id, &photo_id)
                    .await
                    .with_context(|| format!("Failed to add {name} to {title:?}"))?;
            }
            None => {
                log::info!("Creating album {title:?} with {name}");
                let album_id = self
                    .remote
                    .create_album(title, &photo_id)
                    .await
                    .with_context(|| format!("Failed to create album {title:?}"))?;
                self.snapshot.insert_album(&album_id, title, &photo_id);
                report.album_mut(title).created = true;
            }
        }
        self.snapshot.add_member(title, name);
        report.album_mut(title).added += 1;
        Ok(())
    }

    /// Re-read an album with capture dates and write back its members in
    /// date order. The listing is re-read while it does not show this run's
    /// changes yet, up to the configured number of attempts.
    async fn resort(&mut self, title: &str, report: &mut RunReport) -> Result<()> {
        let Some(album) = self.snapshot.album(title).cloned() else {
            log::debug!("Album {title:?} no longer exists, not sorting it");
            return Ok(());
        };

        let mut attempt = 0;
        let listing = loop {
            let listing = fetch_members(self.remote, &album.id, true).await?;
            let names: BTreeSet<&str> = listing.iter().map(|p| p.title.as_str()).collect();
            let expected: BTreeSet<&str> = album.members.iter().map(String::as_str).collect();
            if names == expected {
                break listing;
            }
            attempt += 1;
            if attempt >= self.settle_attempts {
                log::warn!(
                    "Album {title:?} still lists {} photos instead of {}, sorting what is there",
                    names.len(),
                    expected.len()
                );
                break listing;
            }
            log::info!("Album {title:?} is not up to date yet");
            self.remote.settle(attempt).await;
        };

        if listing.is_empty() {
            return Ok(());
        }
        let sorted = by_capture_date(listing);
        let ids: Vec<String> = sorted.iter().map(|p| p.id.clone()).collect();
        let primary = if ids.contains(&album.primary) { album.primary.clone() } else { ids[0].clone() };

        log::info!("Sorting {title:?} ({} photos)", ids.len());
        self.remote
            .edit_album_photos(&album.id, &primary, &ids)
            .await
            .with_context(|| format!("Failed to sort album {title:?}"))?;
        self.snapshot.set_primary(title, &primary);
        report.album_mut(title).sorted = Some(ids.len());
        Ok(())
    }

    /// Put albums in capture-date order without touching membership or
    /// cover. Albums already in order are left alone.
    pub async fn sort_albums(&mut self, titles: &[String], report: &mut RunReport) -> Result<()> {
        for title in titles {
            let Some(album_id) = self.snapshot.album(title).map(|a| a.id.clone()) else {
                log::warn!("Album {title:?} does not exist");
                continue;
            };
            let listing = fetch_members(self.remote, &album_id, true).await?;
            let current: Vec<String> = listing.iter().map(|p| p.id.clone()).collect();
            let ids: Vec<String> = by_capture_date(listing).into_iter().map(|p| p.id).collect();
            if ids == current {
                log::info!("Album {title:?} is already sorted");
            } else {
                log::info!("Sorting {title:?} ({} photos)", ids.len());
                self.remote
                    .reorder_album_photos(&album_id, &ids)
                    .await
                    .with_context(|| format!("Failed to sort album {title:?}"))?;
            }
            report.album_mut(title).sorted = Some(ids.len());
        }
        Ok(())
    }
}
