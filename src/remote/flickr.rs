use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::oauth::Credentials;
use super::{Connector, Page, PhotoService, RemoteAlbum, RemotePhoto};
use crate::config::ServiceConfig;

const REST_ENDPOINT: &str = "https://api.flickr.com/services/rest/";
const UPLOAD_ENDPOINT: &str = "https://up.flickr.com/services/upload/";
const REPLACE_ENDPOINT: &str = "https://up.flickr.com/services/replace/";
const PER_PAGE: u32 = 500;

/// Failures reported by Flickr itself.
#[derive(Error, Debug)]
pub enum FlickrError {
    /// The API answered with `stat="fail"`
    #[error("Flickr API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Non-success HTTP status
    #[error("Flickr HTTP error (status {status}): {body}")]
    Http { status: u16, body: String },

    /// The response did not have the expected shape
    #[error("Failed to parse Flickr response: {0}")]
    Parse(String),

    /// Tokens or keys missing from the service config
    #[error("Flickr credentials incomplete: {0}")]
    Credentials(String),
}

#[derive(Clone, Copy)]
enum Verb {
    Get,
    Post,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

// ============================================================================
// Response shapes
// ============================================================================

/// Flickr sends page counters as numbers or as strings depending on the method.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(u32),
        Text(String),
    }
    match NumOrText::deserialize(deserializer)? {
        NumOrText::Num(n) => Ok(n),
        NumOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct Content {
    #[serde(rename = "_content")]
    content: String,
}

#[derive(Deserialize)]
struct PhotosetList {
    photosets: PhotosetPage,
}

#[derive(Deserialize)]
struct PhotosetPage {
    #[serde(deserialize_with = "lenient_u32")]
    page: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pages: u32,
    #[serde(default)]
    photoset: Vec<Photoset>,
}

#[derive(Deserialize)]
struct Photoset {
    id: String,
    primary: String,
    title: Content,
}

#[derive(Deserialize)]
struct PhotosetPhotos {
    photoset: PhotosetPhotoPage,
}

#[derive(Deserialize)]
struct PhotosetPhotoPage {
    #[serde(deserialize_with = "lenient_u32")]
    page: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pages: u32,
    #[serde(default)]
    photo: Vec<PhotoEntry>,
}

#[derive(Deserialize)]
struct PhotoEntry {
    id: String,
    title: String,
    #[serde(default)]
    datetaken: Option<String>,
}

#[derive(Deserialize)]
struct Created {
    photoset: CreatedPhotoset,
}

#[derive(Deserialize)]
struct CreatedPhotoset {
    id: String,
}

#[derive(Deserialize)]
struct Login {
    user: LoginUser,
}

#[derive(Deserialize)]
struct LoginUser {
    id: String,
    username: Content,
}

/// Check `stat` and decode the payload of a REST response.
fn parse_rest<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FlickrError::Parse(e.to_string()))?;
    if json["stat"] != "ok" {
        return Err(FlickrError::Api {
            code: json["code"].as_i64().unwrap_or(-1),
            message: json["message"].as_str().unwrap_or("unknown error").to_string(),
        }
        .into());
    }
    serde_json::from_value(json).map_err(|e| FlickrError::Parse(e.to_string()).into())
}

/// The photo id from an upload/replace response (XML).
fn parse_upload_response(body: &str) -> Result<String> {
    if !body.contains("stat=\"ok\"") {
        let attr = |name: &str| {
            let key = format!("{name}=\"");
            body.find(&key).and_then(|at| {
                let rest = &body[at + key.len()..];
                rest.find('"').map(|end| rest[..end].to_string())
            })
        };
        return Err(FlickrError::Api {
            code: attr("code").and_then(|c| c.parse().ok()).unwrap_or(-1),
            message: attr("msg").unwrap_or_else(|| body.trim().to_string()),
        }
        .into());
    }
    let start = body
        .find("<photoid")
        .ok_or_else(|| FlickrError::Parse(format!("no photoid in {body:?}")))?;
    let rest = &body[start..];
    let open = rest.find('>').ok_or_else(|| FlickrError::Parse(body.to_string()))?;
    let close = rest.find("</photoid>").ok_or_else(|| FlickrError::Parse(body.to_string()))?;
    Ok(rest[open + 1..close].trim().to_string())
}

/// Tags are space separated; tags containing spaces are quoted.
fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| if t.contains(char::is_whitespace) { format!("\"{t}\"") } else { t.clone() })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Service
// ============================================================================

pub struct FlickrService {
    credentials: Credentials,
    user_id: String,
    client: Client,
}

impl FlickrService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        if config.oauth_token.is_empty() || config.oauth_token_secret.is_empty() {
            return Err(FlickrError::Credentials(
                "oauthToken and oauthTokenSecret are required in flickr.yaml".into(),
            )
            .into());
        }
        Ok(Self {
            credentials: Credentials {
                consumer_key: config.api_key.clone(),
                consumer_secret: config.api_secret.clone(),
                token: config.oauth_token.clone(),
                token_secret: config.oauth_token_secret.clone(),
            },
            user_id: config.user_id.clone(),
            client: Client::new(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, verb: Verb, method: &str, params: &[(&str, String)]) -> Result<T> {
        let mut all: Vec<(String, String)> = vec![
            ("method".to_string(), method.to_string()),
            ("format".to_string(), "json".to_string()),
            ("nojsoncallback".to_string(), "1".to_string()),
        ];
        all.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));
        let signed = self.credentials.sign(verb.as_str(), REST_ENDPOINT, &all)?;

        log::debug!("Flickr {method} {params:?}");
        let request = match verb {
            Verb::Get => self.client.get(REST_ENDPOINT).query(&signed),
            Verb::Post => self.client.post(REST_ENDPOINT).form(&signed),
        };
        let resp = request
            .send()
            .await
            .with_context(|| format!("Flickr request {method} failed"))?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read Flickr response")?;
        if !status.is_success() {
            return Err(FlickrError::Http { status: status.as_u16(), body: text }.into());
        }
        parse_rest(&text).with_context(|| format!("Flickr {method}"))
    }

    async fn send_file(&self, endpoint: &str, path: &Path, params: &[(&str, String)]) -> Result<String> {
        let params: Vec<(String, String)> = params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let signed = self.credentials.sign("POST", endpoint, &params)?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str("image/jpeg")?;
        let form = signed
            .into_iter()
            .fold(Form::new(), |form, (k, v)| form.text(k, v))
            .part("photo", part);

        let resp = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Flickr upload of {} failed", path.display()))?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read Flickr upload response")?;
        if !status.is_success() {
            return Err(FlickrError::Http { status: status.as_u16(), body: text }.into());
        }
        parse_upload_response(&text)
    }

    /// Verify the tokens; returns the authenticated user name.
    pub async fn check_login(&self) -> Result<String> {
        let login: Login = self.call(Verb::Get, "flickr.test.login", &[]).await?;
        if !self.user_id.is_empty() && login.user.id != self.user_id {
            log::warn!(
                "Flickr tokens belong to {} but flickrUserId is {}",
                login.user.id,
                self.user_id
            );
        }
        Ok(login.user.username.content)
    }
}

#[async_trait::async_trait]
impl PhotoService for FlickrService {
    fn name(&self) -> &str {
        "Flickr"
    }

    async fn list_albums(&self, page: u32) -> Result<Page<RemoteAlbum>> {
        let list: PhotosetList = self
            .call(
                Verb::Get,
                "flickr.photosets.getList",
                &[
                    ("user_id", self.user_id.clone()),
                    ("page", page.to_string()),
                    ("per_page", PER_PAGE.to_string()),
                ],
            )
            .await?;
        let sets = list.photosets;
        Ok(Page {
            page: sets.page,
            pages: sets.pages.max(1),
            items: sets
                .photoset
                .into_iter()
                .map(|s| RemoteAlbum { id: s.id, title: s.title.content, primary: s.primary })
                .collect(),
        })
    }

    async fn album_photos(&self, album_id: &str, page: u32, with_dates: bool) -> Result<Page<RemotePhoto>> {
        let mut params = vec![
            ("photoset_id", album_id.to_string()),
            ("user_id", self.user_id.clone()),
            ("page", page.to_string()),
            ("per_page", PER_PAGE.to_string()),
        ];
        if with_dates {
            params.push(("extras", "date_taken".to_string()));
        }
        let photos: PhotosetPhotos = self.call(Verb::Get, "flickr.photosets.getPhotos", &params).await?;
        let set = photos.photoset;
        Ok(Page {
            page: set.page,
            pages: set.pages.max(1),
            items: set
                .photo
                .into_iter()
                .map(|p| RemotePhoto {
                    id: p.id,
                    title: p.title,
                    date_taken: p.datetaken.filter(|d| !d.is_empty()),
                })
                .collect(),
        })
    }

    async fn create_album(&self, title: &str, primary_photo_id: &str) -> Result<String> {
        let created: Created = self
            .call(
                Verb::Post,
                "flickr.photosets.create",
                &[("title", title.to_string()), ("primary_photo_id", primary_photo_id.to_string())],
            )
            .await?;
        Ok(created.photoset.id)
    }

    async fn add_photo(&self, album_id: &str, photo_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                Verb::Post,
                "flickr.photosets.addPhoto",
                &[("photoset_id", album_id.to_string()), ("photo_id", photo_id.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn remove_photo(&self, album_id: &str, photo_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                Verb::Post,
                "flickr.photosets.removePhoto",
                &[("photoset_id", album_id.to_string()), ("photo_id", photo_id.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn edit_album_photos(&self, album_id: &str, primary_photo_id: &str, photo_ids: &[String]) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                Verb::Post,
                "flickr.photosets.editPhotos",
                &[
                    ("photoset_id", album_id.to_string()),
                    ("primary_photo_id", primary_photo_id.to_string()),
                    ("photo_ids", photo_ids.join(",")),
                ],
            )
            .await?;
        Ok(())
    }

    async fn reorder_album_photos(&self, album_id: &str, photo_ids: &[String]) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                Verb::Post,
                "flickr.photosets.reorderPhotos",
                &[("photoset_id", album_id.to_string()), ("photo_ids", photo_ids.join(","))],
            )
            .await?;
        Ok(())
    }

    async fn upload_photo(&self, path: &Path, title: &str) -> Result<String> {
        self.send_file(UPLOAD_ENDPOINT, path, &[("title", title.to_string())]).await
    }

    async fn replace_photo(&self, photo_id: &str, path: &Path) -> Result<()> {
        let replaced = self.send_file(REPLACE_ENDPOINT, path, &[("photo_id", photo_id.to_string())]).await?;
        if replaced != photo_id {
            log::debug!("Flickr replace of {photo_id} answered with photo id {replaced}");
        }
        Ok(())
    }

    async fn set_meta(&self, photo_id: &str, title: &str, description: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                Verb::Post,
                "flickr.photos.setMeta",
                &[
                    ("photo_id", photo_id.to_string()),
                    ("title", title.to_string()),
                    ("description", description.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn set_tags(&self, photo_id: &str, tags: &[String]) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                Verb::Post,
                "flickr.photos.setTags",
                &[("photo_id", photo_id.to_string()), ("tags", format_tags(tags))],
            )
            .await?;
        Ok(())
    }
}

/// Builds a [`FlickrService`] from the service config and checks its tokens.
pub struct FlickrConnector {
    config: ServiceConfig,
}

impl FlickrConnector {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Connector for FlickrConnector {
    async fn connect(&self) -> Result<Arc<dyn PhotoService>> {
        log::info!("Connecting to Flickr");
        let service = FlickrService::new(&self.config)?;
        let user = service.check_login().await.context("Flickr login failed")?;
        log::info!("Logged in to Flickr as {user}");
        Ok(Arc::new(service))
    }
}
