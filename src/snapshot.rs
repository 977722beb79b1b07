//! The observed remote state: which albums exist and which photos they hold.
//!
//! Albums are looked up by title case-insensitively. Photo name ↔ id pairs
//! come from the main album only; every other album contributes
//! "name is a member of title" facts.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use crate::remote::{Page, Remote, RemoteAlbum, RemotePhoto};

fn fold(title: &str) -> String {
    title.trim().to_lowercase()
}

/// One remote album as last observed (and as changed by this run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumState {
    pub id: String,
    pub title: String,
    /// Cover photo id; empty once the cover was removed by this run.
    pub primary: String,
    /// Member photo names.
    pub members: BTreeSet<String>,
    /// Needs re-sorting at the end of the run.
    pub touched: bool,
}

/// Which albums to fetch and how much of them.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions<'a> {
    /// Lower-cased keywords of the collection plus the default keywords.
    pub vocabulary: &'a BTreeSet<String>,
    /// Explicit album titles to restrict the run to.
    pub scope: Option<&'a BTreeSet<String>>,
    /// List members of every fetched album.
    pub contents: bool,
    /// Mark the main album touched.
    pub touch_main: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    main_title: String,
    albums: BTreeMap<String, AlbumState>,
    photo_ids: BTreeMap<String, String>,
    photo_names: BTreeMap<String, String>,
    memberships: BTreeMap<String, BTreeSet<String>>,
    scope: Option<BTreeSet<String>>,
}

/// Page 1, then pages 2..=N, concatenated in order.
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let first = fetch(1).await?;
    let pages = first.pages;
    let mut items = first.items;
    for page in 2..=pages {
        items.extend(fetch(page).await?.items);
    }
    Ok(items)
}

/// Every album of the account.
pub async fn fetch_albums(remote: &Remote) -> Result<Vec<RemoteAlbum>> {
    collect_pages(move |page| remote.list_albums(page))
        .await
        .context("Failed to list albums")
}

/// Every member of an album, in album order.
pub async fn fetch_members(remote: &Remote, album_id: &str, with_dates: bool) -> Result<Vec<RemotePhoto>> {
    collect_pages(move |page| remote.album_photos(album_id, page, with_dates))
        .await
        .with_context(|| format!("Failed to list photos of album {album_id}"))
}

impl RemoteSnapshot {
    pub fn new(main_title: &str, scope: Option<&BTreeSet<String>>) -> Self {
        Self {
            main_title: main_title.to_string(),
            scope: scope.map(|titles| titles.iter().map(|t| fold(t)).collect()),
            ..Default::default()
        }
    }

    /// List the relevant albums and, with `contents`, their members.
    pub async fn fetch(remote: &Remote, main_title: &str, options: &FetchOptions<'_>) -> Result<Self> {
        let mut snapshot = Self::new(main_title, options.scope);

        for album in fetch_albums(remote).await? {
            let is_main = snapshot.is_main(&album.title);
            if !is_main && !options.vocabulary.contains(&fold(&album.title)) {
                log::debug!("Ignoring album {:?}: not a keyword", album.title);
                continue;
            }
            if !is_main && !snapshot.in_scope(&album.title) {
                continue;
            }
            if snapshot.album(&album.title).is_some() {
                log::warn!("Duplicate album {:?} ({}), ignoring it", album.title, album.id);
                continue;
            }
            snapshot.insert_album(&album.id, &album.title, &album.primary);
        }

        if options.contents {
            // The main album first, so that names resolve to ids.
            let mut keys: Vec<String> = snapshot.albums.keys().cloned().collect();
            keys.sort_by_key(|key| *key != fold(main_title));
            for key in keys {
                let Some((id, title)) = snapshot.albums.get(&key).map(|a| (a.id.clone(), a.title.clone())) else {
                    continue;
                };
                let members = fetch_members(remote, &id, false).await?;
                log::debug!("Album {title:?} has {} photos", members.len());
                snapshot.record_members(&title, &members);
            }
        }

        if options.touch_main {
            snapshot.touch(main_title);
        }

        log::info!(
            "Found {} albums, {} photos in {:?}",
            snapshot.albums.len(),
            snapshot.photo_ids.len(),
            main_title
        );
        Ok(snapshot)
    }

    pub fn main_title(&self) -> &str {
        &self.main_title
    }

    pub fn is_main(&self, title: &str) -> bool {
        fold(title) == fold(&self.main_title)
    }

    pub fn main_album(&self) -> Option<&AlbumState> {
        self.album(&self.main_title)
    }

    /// True when no scope was given or the title is in it.
    pub fn in_scope(&self, title: &str) -> bool {
        self.scope.as_ref().is_none_or(|scope| scope.contains(&fold(title)))
    }

    pub fn album(&self, title: &str) -> Option<&AlbumState> {
        self.albums.get(&fold(title))
    }

    pub fn albums(&self) -> impl Iterator<Item = &AlbumState> {
        self.albums.values()
    }

    pub fn photo_id(&self, name: &str) -> Option<&str> {
        self.photo_ids.get(name).map(String::as_str)
    }

    pub fn photo_name(&self, id: &str) -> Option<&str> {
        self.photo_names.get(id).map(String::as_str)
    }

    /// Titles of the non-main albums holding a photo.
    pub fn memberships(&self, name: &str) -> Vec<&str> {
        self.memberships
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|key| self.albums.get(key))
            .map(|album| album.title.as_str())
            .collect()
    }

    /// Titles of touched albums, ordered by title.
    pub fn touched(&self) -> Vec<String> {
        self.albums.values().filter(|a| a.touched).map(|a| a.title.clone()).collect()
    }

    pub fn insert_album(&mut self, id: &str, title: &str, primary: &str) {
        self.albums.insert(
            fold(title),
            AlbumState {
                id: id.to_string(),
                title: title.to_string(),
                primary: primary.to_string(),
                members: BTreeSet::new(),
                touched: false,
            },
        );
    }

    /// Record a fetched member listing of an existing album.
    pub fn record_members(&mut self, title: &str, photos: &[RemotePhoto]) {
        let key = fold(title);
        let is_main = self.is_main(title);
        for photo in photos {
            if is_main {
                if let Some(previous) = self.photo_ids.get(&photo.title) {
                    log::warn!(
                        "Photo {:?} appears twice in {:?} ({previous} and {}), using the first",
                        photo.title,
                        self.main_title,
                        photo.id
                    );
                    continue;
                }
                self.register_photo(&photo.title, &photo.id);
            } else if let Some(album) = self.albums.get_mut(&key) {
                album.members.insert(photo.title.clone());
                self.memberships.entry(photo.title.clone()).or_default().insert(key.clone());
            }
        }
    }

    /// Mark an album for re-sorting. Unknown titles are ignored.
    pub fn touch(&mut self, title: &str) {
        if let Some(album) = self.albums.get_mut(&fold(title)) {
            album.touched = true;
        }
    }

    /// A photo joined an album during this run.
    pub fn add_member(&mut self, title: &str, name: &str) {
        let key = fold(title);
        let is_main = self.is_main(title);
        if let Some(album) = self.albums.get_mut(&key) {
            album.members.insert(name.to_string());
            album.touched = true;
            if !is_main {
                self.memberships.entry(name.to_string()).or_default().insert(key);
            }
        }
    }

    /// A photo left an album during this run. The service deletes an album
    /// once its last photo is removed; so does the snapshot.
    pub fn remove_member(&mut self, title: &str, name: &str) {
        let key = fold(title);
        let removed_id = self.photo_id(name).map(str::to_string);
        if let Some(album) = self.albums.get_mut(&key) {
            album.members.remove(name);
            album.touched = true;
            if removed_id.is_some_and(|id| id == album.primary) {
                album.primary.clear();
            }
            if album.members.is_empty() {
                log::debug!("Album {:?} is now empty", album.title);
                self.albums.remove(&key);
            }
        }
        if let Some(titles) = self.memberships.get_mut(name) {
            titles.remove(&key);
        }
    }

    /// Name ↔ id for a photo of the main album.
    pub fn register_photo(&mut self, name: &str, id: &str) {
        self.photo_ids.insert(name.to_string(), id.to_string());
        self.photo_names.insert(id.to_string(), name.to_string());
        let key = fold(&self.main_title);
        if let Some(main) = self.albums.get_mut(&key) {
            main.members.insert(name.to_string());
        }
    }

    pub fn set_primary(&mut self, title: &str, photo_id: &str) {
        if let Some(album) = self.albums.get_mut(&fold(title)) {
            album.primary = photo_id.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::NoDelay;
    use crate::remote::MemoryService;
    use std::sync::Arc;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn photo(id: &str, title: &str) -> RemotePhoto {
        RemotePhoto { id: id.into(), title: title.into(), date_taken: None }
    }

    // ── pagination ───────────────────────────────────────────────────

    #[tokio::test]
    async fn members_span_all_pages_in_order() {
        let service = Arc::new(MemoryService::with_page_size(25));
        let ids: Vec<String> = (0..54).map(|i| service.seed_photo(&format!("p{i:02}"), None)).collect();
        let album = service.seed_album("main", &ids);
        let remote = Remote::with_service(service, Arc::new(NoDelay));

        let members = fetch_members(&remote, &album, false).await.unwrap();
        assert_eq!(members.len(), 54);
        let titles: Vec<String> = members.iter().map(|p| p.title.clone()).collect();
        let expected: Vec<String> = (0..54).map(|i| format!("p{i:02}")).collect();
        assert_eq!(titles, expected);
    }

    #[tokio::test]
    async fn albums_span_all_pages() {
        let service = Arc::new(MemoryService::with_page_size(2));
        let p = service.seed_photo("p1", None);
        for title in ["a", "b", "c", "d", "e"] {
            service.seed_album(title, std::slice::from_ref(&p));
        }
        let remote = Remote::with_service(service, Arc::new(NoDelay));
        assert_eq!(fetch_albums(&remote).await.unwrap().len(), 5);
    }

    // ── fetch ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fetch_keeps_main_and_vocabulary_albums() {
        let service = Arc::new(MemoryService::new());
        let p1 = service.seed_photo("p1", None);
        let p2 = service.seed_photo("p2", None);
        service.seed_album("Main", &[p1.clone(), p2.clone()]);
        service.seed_album("Beach", std::slice::from_ref(&p2));
        service.seed_album("holiday 2019", std::slice::from_ref(&p1));
        let remote = Remote::with_service(service, Arc::new(NoDelay));

        let vocabulary = set(&["beach", "sunset"]);
        let options = FetchOptions { vocabulary: &vocabulary, scope: None, contents: true, touch_main: true };
        let snapshot = RemoteSnapshot::fetch(&remote, "Main", &options).await.unwrap();

        assert!(snapshot.album("holiday 2019").is_none());
        assert_eq!(snapshot.photo_id("p1"), Some(p1.as_str()));
        assert_eq!(snapshot.photo_name(&p2), Some("p2"));
        assert_eq!(snapshot.memberships("p2"), vec!["Beach"]);
        assert!(snapshot.memberships("p1").is_empty());
        assert_eq!(snapshot.touched(), vec!["Main"]);
    }

    #[tokio::test]
    async fn fetch_respects_scope_and_skips_contents() {
        let service = Arc::new(MemoryService::new());
        let p1 = service.seed_photo("p1", None);
        service.seed_album("main", std::slice::from_ref(&p1));
        service.seed_album("beach", std::slice::from_ref(&p1));
        service.seed_album("sunset", std::slice::from_ref(&p1));
        let remote = Remote::with_service(service.clone(), Arc::new(NoDelay));

        let vocabulary = set(&["beach", "sunset"]);
        let scope = set(&["Sunset"]);
        let options = FetchOptions { vocabulary: &vocabulary, scope: Some(&scope), contents: false, touch_main: false };
        let snapshot = RemoteSnapshot::fetch(&remote, "main", &options).await.unwrap();

        assert!(snapshot.album("beach").is_none());
        assert!(snapshot.album("SUNSET").is_some());
        assert!(snapshot.main_album().is_some());
        assert!(!snapshot.in_scope("main"));
        assert!(snapshot.photo_id("p1").is_none());
        assert!(snapshot.touched().is_empty());
    }

    // ── bookkeeping ──────────────────────────────────────────────────

    #[test]
    fn removing_cover_and_last_member() {
        let mut snapshot = RemoteSnapshot::new("main", None);
        snapshot.insert_album("m", "main", "1");
        snapshot.insert_album("b", "beach", "1");
        snapshot.record_members("main", &[photo("1", "p1"), photo("2", "p2")]);
        snapshot.record_members("beach", &[photo("1", "p1"), photo("2", "p2")]);

        snapshot.remove_member("beach", "p1");
        let beach = snapshot.album("beach").unwrap();
        assert_eq!(beach.primary, "");
        assert!(beach.touched);
        assert!(snapshot.memberships("p1").is_empty());

        snapshot.remove_member("beach", "p2");
        assert!(snapshot.album("beach").is_none());
    }

    #[test]
    fn duplicate_names_in_main_keep_the_first() {
        let mut snapshot = RemoteSnapshot::new("main", None);
        snapshot.insert_album("m", "main", "1");
        snapshot.record_members("main", &[photo("1", "p1"), photo("9", "p1")]);
        assert_eq!(snapshot.photo_id("p1"), Some("1"));
        assert_eq!(snapshot.photo_name("9"), None);
    }
}
