//! An in-memory photo service with Flickr's album semantics.
//!
//! Used by the test suite and for dry runs. Listings are paged like the real
//! service, every mutating call is recorded, and removing the last photo of an
//! album deletes the album.

use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{Page, PhotoService, RemoteAlbum, RemotePhoto};
use crate::exif::read_embedded;

const DEFAULT_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAlbum {
    pub id: String,
    pub title: String,
    pub primary: String,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryPhoto {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub date_taken: Option<String>,
    pub replaced: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub albums: Vec<MemoryAlbum>,
    pub photos: BTreeMap<String, MemoryPhoto>,
    /// Mutating calls in order, e.g. `add_photo sunset p1`.
    pub calls: Vec<String>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn album_mut(&mut self, album_id: &str) -> Result<&mut MemoryAlbum> {
        match self.albums.iter_mut().find(|a| a.id == album_id) {
            Some(album) => Ok(album),
            None => bail!("Album {album_id} not found"),
        }
    }

    fn title_of(&self, photo_id: &str) -> String {
        self.photos.get(photo_id).map(|p| p.title.clone()).unwrap_or_else(|| photo_id.to_string())
    }

    fn album_title(&self, album_id: &str) -> String {
        self.albums
            .iter()
            .find(|a| a.id == album_id)
            .map(|a| a.title.clone())
            .unwrap_or_else(|| album_id.to_string())
    }
}

pub struct MemoryService {
    state: Mutex<MemoryState>,
    page_size: usize,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self { state: Mutex::new(MemoryState::default()), page_size: page_size.max(1) }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a photo without recording a call; returns its id.
    pub fn seed_photo(&self, title: &str, date_taken: Option<&str>) -> String {
        let mut state = self.state();
        let id = state.next_id("photo-");
        state.photos.insert(
            id.clone(),
            MemoryPhoto {
                id: id.clone(),
                title: title.to_string(),
                date_taken: date_taken.map(str::to_string),
                ..Default::default()
            },
        );
        id
    }

    /// Add an album without recording a call; the first photo becomes primary.
    pub fn seed_album(&self, title: &str, photo_ids: &[String]) -> String {
        let mut state = self.state();
        let id = state.next_id("album-");
        state.albums.push(MemoryAlbum {
            id: id.clone(),
            title: title.to_string(),
            primary: photo_ids.first().cloned().unwrap_or_default(),
            photos: photo_ids.to_vec(),
        });
        id
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state().clone()
    }

    pub fn album(&self, title: &str) -> Option<MemoryAlbum> {
        self.state().albums.iter().find(|a| a.title == title).cloned()
    }

    /// Member titles of an album, in album order.
    pub fn album_titles(&self, title: &str) -> Vec<String> {
        let state = self.state();
        state
            .albums
            .iter()
            .find(|a| a.title == title)
            .map(|a| a.photos.iter().map(|id| state.title_of(id)).collect())
            .unwrap_or_default()
    }

    pub fn photo(&self, photo_id: &str) -> Option<MemoryPhoto> {
        self.state().photos.get(photo_id).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn page<T: Clone>(&self, items: &[T], page: u32) -> Page<T> {
        let pages = items.len().div_ceil(self.page_size).max(1) as u32;
        let start = (page.max(1) as usize - 1) * self.page_size;
        let items = items.iter().skip(start).take(self.page_size).cloned().collect();
        Page { page, pages, items }
    }
}

/// Flickr reports `date_taken` with dashes in the date part.
fn service_date(exif_date: &str) -> String {
    exif_date.replacen(':', "-", 2)
}

fn date_from_file(path: &Path) -> Option<String> {
    read_embedded(path).ok().and_then(|m| m.values.capture_date()).map(|d| service_date(&d))
}

#[async_trait::async_trait]
impl PhotoService for MemoryService {
    fn name(&self) -> &str {
        "Memory"
    }

    async fn list_albums(&self, page: u32) -> Result<Page<RemoteAlbum>> {
        let albums: Vec<RemoteAlbum> = self
            .state()
            .albums
            .iter()
            .map(|a| RemoteAlbum { id: a.id.clone(), title: a.title.clone(), primary: a.primary.clone() })
            .collect();
        Ok(self.page(&albums, page))
    }

    async fn album_photos(&self, album_id: &str, page: u32, with_dates: bool) -> Result<Page<RemotePhoto>> {
        let photos: Vec<RemotePhoto> = {
            let mut state = self.state();
            let album = state.album_mut(album_id)?.clone();
            album
                .photos
                .iter()
                .map(|id| {
                    let photo = state.photos.get(id).cloned().unwrap_or_default();
                    RemotePhoto {
                        id: id.clone(),
                        title: photo.title,
                        date_taken: if with_dates { photo.date_taken } else { None },
                    }
                })
                .collect()
        };
        Ok(self.page(&photos, page))
    }

    async fn create_album(&self, title: &str, primary_photo_id: &str) -> Result<String> {
        let mut state = self.state();
        if !state.photos.contains_key(primary_photo_id) {
            bail!("Photo {primary_photo_id} not found");
        }
        let id = state.next_id("album-");
        state.albums.push(MemoryAlbum {
            id: id.clone(),
            title: title.to_string(),
            primary: primary_photo_id.to_string(),
            photos: vec![primary_photo_id.to_string()],
        });
        let name = state.title_of(primary_photo_id);
        state.calls.push(format!("create_album {title} {name}"));
        Ok(id)
    }

    async fn add_photo(&self, album_id: &str, photo_id: &str) -> Result<()> {
        let mut state = self.state();
        if !state.photos.contains_key(photo_id) {
            bail!("Photo {photo_id} not found");
        }
        let album = state.album_mut(album_id)?;
        if album.photos.iter().any(|p| p == photo_id) {
            bail!("Photo {photo_id} is already in album {album_id}");
        }
        album.photos.push(photo_id.to_string());
        let (title, name) = (state.album_title(album_id), state.title_of(photo_id));
        state.calls.push(format!("add_photo {title} {name}"));
        Ok(())
    }

    async fn remove_photo(&self, album_id: &str, photo_id: &str) -> Result<()> {
        let mut state = self.state();
        let (title, name) = (state.album_title(album_id), state.title_of(photo_id));
        let album = state.album_mut(album_id)?;
        let before = album.photos.len();
        album.photos.retain(|p| p != photo_id);
        if album.photos.len() == before {
            bail!("Photo {photo_id} is not in album {album_id}");
        }
        if album.primary == photo_id {
            album.primary = album.photos.first().cloned().unwrap_or_default();
        }
        if album.photos.is_empty() {
            state.albums.retain(|a| a.id != album_id);
        }
        state.calls.push(format!("remove_photo {title} {name}"));
        Ok(())
    }

    async fn edit_album_photos(&self, album_id: &str, primary_photo_id: &str, photo_ids: &[String]) -> Result<()> {
        let mut state = self.state();
        if !photo_ids.iter().any(|p| p == primary_photo_id) {
            bail!("Primary photo {primary_photo_id} must be one of the album's photos");
        }
        let title = state.album_title(album_id);
        let album = state.album_mut(album_id)?;
        album.primary = primary_photo_id.to_string();
        album.photos = photo_ids.to_vec();
        let names: Vec<String> = photo_ids.iter().map(|id| state.title_of(id)).collect();
        let primary = state.title_of(primary_photo_id);
        state.calls.push(format!("edit_album_photos {title} {primary} [{}]", names.join(",")));
        Ok(())
    }

    async fn reorder_album_photos(&self, album_id: &str, photo_ids: &[String]) -> Result<()> {
        let mut state = self.state();
        let title = state.album_title(album_id);
        let album = state.album_mut(album_id)?;
        let mut current = album.photos.clone();
        let mut requested = photo_ids.to_vec();
        current.sort();
        requested.sort();
        if current != requested {
            bail!("Reorder of album {album_id} does not list exactly its photos");
        }
        album.photos = photo_ids.to_vec();
        let names: Vec<String> = photo_ids.iter().map(|id| state.title_of(id)).collect();
        state.calls.push(format!("reorder_album_photos {title} [{}]", names.join(",")));
        Ok(())
    }

    async fn upload_photo(&self, path: &Path, title: &str) -> Result<String> {
        let date_taken = date_from_file(path);
        let mut state = self.state();
        let id = state.next_id("photo-");
        state.photos.insert(
            id.clone(),
            MemoryPhoto { id: id.clone(), title: title.to_string(), date_taken, ..Default::default() },
        );
        state.calls.push(format!("upload_photo {title}"));
        Ok(id)
    }

    async fn replace_photo(&self, photo_id: &str, path: &Path) -> Result<()> {
        let date_taken = date_from_file(path);
        let mut state = self.state();
        let Some(photo) = state.photos.get_mut(photo_id) else {
            bail!("Photo {photo_id} not found");
        };
        photo.replaced += 1;
        if date_taken.is_some() {
            photo.date_taken = date_taken;
        }
        let name = photo.title.clone();
        state.calls.push(format!("replace_photo {name}"));
        Ok(())
    }

    async fn set_meta(&self, photo_id: &str, title: &str, description: &str) -> Result<()> {
        let mut state = self.state();
        let Some(photo) = state.photos.get_mut(photo_id) else {
            bail!("Photo {photo_id} not found");
        };
        photo.title = title.to_string();
        photo.description = description.to_string();
        state.calls.push(format!("set_meta {title}"));
        Ok(())
    }

    async fn set_tags(&self, photo_id: &str, tags: &[String]) -> Result<()> {
        let mut state = self.state();
        let Some(photo) = state.photos.get_mut(photo_id) else {
            bail!("Photo {photo_id} not found");
        };
        photo.tags = tags.to_vec();
        let name = photo.title.clone();
        state.calls.push(format!("set_tags {name}"));
        Ok(())
    }
}
