mod flickr;
pub mod memory;
mod oauth;

pub use flickr::{FlickrConnector, FlickrError, FlickrService};
pub use memory::MemoryService;
pub use oauth::Credentials;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::pacing::Pacing;

/// An album (Flickr photoset) as listed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAlbum {
    pub id: String,
    pub title: String,
    /// Id of the cover photo.
    pub primary: String,
}

/// A photo as listed in an album. The title is the collection's photo name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePhoto {
    pub id: String,
    pub title: String,
    /// Capture date as reported by the service, when requested.
    pub date_taken: Option<String>,
}

/// One page of a paged listing. Pages are numbered from 1.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub page: u32,
    pub pages: u32,
    pub items: Vec<T>,
}

/// The remote photo service: albums with ordered members, and photos with a
/// title, description and tags.
///
/// The library ships [`FlickrService`] and the in-memory [`MemoryService`].
#[async_trait::async_trait]
pub trait PhotoService: Send + Sync {
    /// The display name of this service.
    fn name(&self) -> &str;

    async fn list_albums(&self, page: u32) -> Result<Page<RemoteAlbum>>;
    async fn album_photos(&self, album_id: &str, page: u32, with_dates: bool) -> Result<Page<RemotePhoto>>;

    /// Create an album around its first photo; returns the new album id.
    async fn create_album(&self, title: &str, primary_photo_id: &str) -> Result<String>;
    async fn add_photo(&self, album_id: &str, photo_id: &str) -> Result<()>;
    async fn remove_photo(&self, album_id: &str, photo_id: &str) -> Result<()>;
    /// Set the complete member list in order, together with the cover photo.
    async fn edit_album_photos(&self, album_id: &str, primary_photo_id: &str, photo_ids: &[String]) -> Result<()>;
    /// Reorder members without changing membership or cover.
    async fn reorder_album_photos(&self, album_id: &str, photo_ids: &[String]) -> Result<()>;

    /// Upload a new photo; returns its id.
    async fn upload_photo(&self, path: &Path, title: &str) -> Result<String>;
    /// Replace the image bytes of an existing photo.
    async fn replace_photo(&self, photo_id: &str, path: &Path) -> Result<()>;
    async fn set_meta(&self, photo_id: &str, title: &str, description: &str) -> Result<()>;
    async fn set_tags(&self, photo_id: &str, tags: &[String]) -> Result<()>;
}

/// Establishes an authenticated service.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn PhotoService>>;
}

/// A connector for a service that is already set up.
pub struct Connected(pub Arc<dyn PhotoService>);

#[async_trait::async_trait]
impl Connector for Connected {
    async fn connect(&self) -> Result<Arc<dyn PhotoService>> {
        Ok(Arc::clone(&self.0))
    }
}

/// Owns the connection. Connects on first use and reuses it afterwards.
pub struct Session {
    connector: Box<dyn Connector>,
    service: OnceCell<Arc<dyn PhotoService>>,
}

impl Session {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self { connector, service: OnceCell::new() }
    }

    pub fn is_connected(&self) -> bool {
        self.service.initialized()
    }

    pub async fn service(&self) -> Result<Arc<dyn PhotoService>> {
        let service = self
            .service
            .get_or_try_init(|| async {
                let service = self.connector.connect().await?;
                log::debug!("Connected to {}", service.name());
                Ok::<_, anyhow::Error>(service)
            })
            .await?;
        Ok(Arc::clone(service))
    }
}

/// The paced handle the engine talks to: every call waits on the pacing
/// policy first.
pub struct Remote {
    session: Session,
    pacer: Arc<dyn Pacing>,
}

impl Remote {
    pub fn new(connector: Box<dyn Connector>, pacer: Arc<dyn Pacing>) -> Self {
        Self { session: Session::new(connector), pacer }
    }

    /// A handle around a service that needs no connecting.
    pub fn with_service(service: Arc<dyn PhotoService>, pacer: Arc<dyn Pacing>) -> Self {
        Self::new(Box::new(Connected(service)), pacer)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn paced(&self) -> Result<Arc<dyn PhotoService>> {
        let service = self.session.service().await?;
        self.pacer.pace().await;
        Ok(service)
    }

    pub async fn settle(&self, attempt: u32) {
        self.pacer.settle(attempt).await;
    }

    pub async fn list_albums(&self, page: u32) -> Result<Page<RemoteAlbum>> {
        self.paced().await?.list_albums(page).await
    }

    pub async fn album_photos(&self, album_id: &str, page: u32, with_dates: bool) -> Result<Page<RemotePhoto>> {
        self.paced().await?.album_photos(album_id, page, with_dates).await
    }

    pub async fn create_album(&self, title: &str, primary_photo_id: &str) -> Result<String> {
        self.paced().await?.create_album(title, primary_photo_id).await
    }

    pub async fn add_photo(&self, album_id: &str, photo_id: &str) -> Result<()> {
        self.paced().await?.add_photo(album_id, photo_id).await
    }

    pub async fn remove_photo(&self, album_id: &str, photo_id: &str) -> Result<()> {
        self.paced().await?.remove_photo(album_id, photo_id).await
    }

    pub async fn edit_album_photos(&self, album_id: &str, primary_photo_id: &str, photo_ids: &[String]) -> Result<()> {
        self.paced().await?.edit_album_photos(album_id, primary_photo_id, photo_ids).await
    }

    pub async fn reorder_album_photos(&self, album_id: &str, photo_ids: &[String]) -> Result<()> {
        self.paced().await?.reorder_album_photos(album_id, photo_ids).await
    }

    pub async fn upload_photo(&self, path: &Path, title: &str) -> Result<String> {
        self.paced().await?.upload_photo(path, title).await
    }

    pub async fn replace_photo(&self, photo_id: &str, path: &Path) -> Result<()> {
        self.paced().await?.replace_photo(photo_id, path).await
    }

    pub async fn set_meta(&self, photo_id: &str, title: &str, description: &str) -> Result<()> {
        self.paced().await?.set_meta(photo_id, title, description).await
    }

    pub async fn set_tags(&self, photo_id: &str, tags: &[String]) -> Result<()> {
        self.paced().await?.set_tags(photo_id, tags).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::NoDelay;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConnector {
        service: Arc<MemoryService>,
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self) -> Result<Arc<dyn PhotoService>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.service.clone())
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self) -> Result<Arc<dyn PhotoService>> {
            anyhow::bail!("no credentials")
        }
    }

    #[derive(Default)]
    struct CountingPacer {
        paces: AtomicUsize,
    }

    #[async_trait]
    impl Pacing for CountingPacer {
        async fn pace(&self) {
            self.paces.fetch_add(1, Ordering::SeqCst);
        }

        async fn settle(&self, _attempt: u32) {}
    }

    // ── session ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn connects_lazily_and_once() {
        let connects = Arc::new(AtomicUsize::new(0));
        let connector = CountingConnector { service: Arc::new(MemoryService::new()), connects: connects.clone() };
        let remote = Remote::new(Box::new(connector), Arc::new(NoDelay));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(!remote.session().is_connected());

        remote.list_albums(1).await.unwrap();
        remote.list_albums(1).await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(remote.session().is_connected());
    }

    #[tokio::test]
    async fn connection_failure_propagates() {
        let remote = Remote::new(Box::new(FailingConnector), Arc::new(NoDelay));
        let err = remote.list_albums(1).await.unwrap_err();
        assert!(err.to_string().contains("no credentials"));
    }

    // ── pacing ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn every_call_is_paced() {
        let pacer = Arc::new(CountingPacer::default());
        let service = Arc::new(MemoryService::new());
        let photo = service.seed_photo("p1", None);
        let remote = Remote::with_service(service, pacer.clone());

        let album = remote.create_album("sunset", &photo).await.unwrap();
        remote.album_photos(&album, 1, false).await.unwrap();
        remote.set_tags(&photo, &["sunset".to_string()]).await.unwrap();
        assert_eq!(pacer.paces.load(Ordering::SeqCst), 3);
    }
}
