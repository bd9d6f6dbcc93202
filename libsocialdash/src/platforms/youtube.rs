//! YouTube platform implementation (Data API v3)
//!
//! Unlike the other platforms, YouTube needs an interactive consent step the
//! first time. [`YouTubeOperations::new`] only checks the credential bundle;
//! [`YouTubeOperations::authenticate`] reuses the cached token, refreshes it,
//! or runs the device flow, and must succeed before any other operation.
//!
//! Uploads use the resumable protocol: one call opens an upload session with
//! the metadata, a second PUT sends the file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::config::{Config, YouTubeConfig};
use crate::credentials::YouTubeCredentials;
use crate::error::{DashError, PlatformError, Result};
use crate::platforms::google_oauth::{DeviceCode, GoogleOAuth, StoredToken, TokenCache};
use crate::platforms::{unix_now, vendor_message, Platform};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::{Identity, PlatformKind, Video, VideoList, VideoMetadata, VideoSnippet};

/// `errors[].reason` values that mean the project ran out of quota
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"];

/// Snippet fields carried over unchanged when a video is updated
const PRESERVED_SNIPPET_FIELDS: &[&str] = &["tags", "defaultLanguage"];

/// Map a non-success Data API response to a typed error
fn map_youtube_error(response: &ApiResponse, context: &str) -> DashError {
    let body = response.json_value();
    let detail = vendor_message(&body, &response.text());
    let reason = body
        .pointer("/error/errors/0/reason")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let error = if QUOTA_REASONS.contains(&reason) || response.status == 429 {
        PlatformError::rate_limit(
            format!("YouTube quota exhausted during {}: {}", context, detail),
            None,
        )
    } else {
        match response.status {
            401 | 403 => PlatformError::Authentication(format!(
                "YouTube refused access during {}: {}",
                context, detail
            )),
            404 => PlatformError::NotFound(format!("YouTube {}: {}", context, detail)),
            400..=499 => PlatformError::Validation(format!(
                "YouTube rejected the request during {}: {}",
                context, detail
            )),
            status => PlatformError::Api(format!(
                "YouTube returned HTTP {} during {}: {}",
                status, context, detail
            )),
        }
    };

    error.into()
}

/// Guess the upload content type from the file extension
pub fn video_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Deserialize)]
struct VideoItems {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Channels {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    snippet: Option<ChannelSnippet>,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

pub struct YouTubeOperations {
    transport: Arc<dyn Transport>,
    config: YouTubeConfig,
    oauth: GoogleOAuth,
    cache: TokenCache,
    token: Option<StoredToken>,
}

impl YouTubeOperations {
    pub fn from_env(config: &Config) -> Result<Self> {
        let creds = YouTubeCredentials::from_env()?;
        let transport = Arc::new(HttpTransport::new(&config.http)?);
        Ok(Self::new(creds, &config.youtube, transport))
    }

    /// Build an unauthenticated client
    pub fn new(
        creds: YouTubeCredentials,
        config: &YouTubeConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        use secrecy::ExposeSecret;

        let oauth = GoogleOAuth::new(
            transport.clone(),
            &config.oauth_base,
            creds.client_id,
            creds.client_secret.expose_secret(),
        );

        Self {
            transport,
            cache: TokenCache::new(config.token_path()),
            config: config.clone(),
            oauth,
            token: None,
        }
    }

    /// Obtain a usable access token and confirm the channel it belongs to
    ///
    /// Order of attempts: the cached token if still valid, a refresh of the
    /// cached token, then the device flow (`on_code` is called with the code
    /// the user has to enter). New tokens are written back to the cache.
    pub async fn authenticate<F>(&mut self, on_code: F) -> Result<Identity>
    where
        F: FnOnce(&DeviceCode),
    {
        let token = match self.cache.load() {
            Some(cached) if !cached.is_expired(unix_now()) => {
                tracing::debug!("Using cached YouTube token");
                cached
            }
            Some(cached) if cached.refresh_token.is_some() => {
                match self.oauth.refresh(&cached).await {
                    Ok(fresh) => {
                        self.cache.save(&fresh)?;
                        fresh
                    }
                    Err(DashError::Platform(PlatformError::Authentication(msg))) => {
                        tracing::warn!("Token refresh rejected ({}), starting a new consent", msg);
                        self.consent(on_code).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => self.consent(on_code).await?,
        };

        self.token = Some(token);
        match self.channel().await {
            Ok(identity) => {
                tracing::info!(
                    "YouTube authenticated successfully for channel {}",
                    identity.username.as_deref().unwrap_or(&identity.id)
                );
                Ok(identity)
            }
            Err(e) => {
                self.token = None;
                Err(e)
            }
        }
    }

    /// Forget the cached token
    pub fn logout(&mut self) -> Result<()> {
        self.token = None;
        self.cache.clear()
    }

    async fn consent<F>(&self, on_code: F) -> Result<StoredToken>
    where
        F: FnOnce(&DeviceCode),
    {
        let token = self.oauth.run_device_flow(on_code).await?;
        self.cache.save(&token)?;
        Ok(token)
    }

    /// Upload a video file
    pub async fn create_video(&self, metadata: &VideoMetadata, path: &Path) -> Result<Video> {
        let token = self.access_token()?;
        if metadata.title.trim().is_empty() {
            return Err(DashError::InvalidInput("Video title cannot be empty".to_string()));
        }

        let data = tokio::fs::read(path).await?;
        let content_type = video_content_type(path);
        tracing::debug!(
            "Uploading {} ({} bytes, {})",
            path.display(),
            data.len(),
            content_type
        );

        let session = ApiRequest::post(format!("{}/videos", self.config.upload_base))
            .query("uploadType", "resumable")
            .query("part", "snippet,status")
            .bearer(token)
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", data.len().to_string())
            .json(json!({
                "snippet": {
                    "title": metadata.title,
                    "description": metadata.description,
                    "categoryId": self.config.category_id,
                },
                "status": {
                    "privacyStatus": metadata.privacy.as_str(),
                }
            }));
        let response = self.send(session, "starting upload").await?;
        let location = response
            .header("location")
            .ok_or_else(|| {
                PlatformError::Api("YouTube did not return an upload session URL".to_string())
            })?
            .to_string();

        let upload = ApiRequest::put(location)
            .bearer(token)
            .bytes(content_type, data);
        let response = self.send(upload, "uploading video").await?;
        let video: Video = response.json("uploading video")?;

        tracing::info!("Video uploaded successfully! Video ID: {}", video.id);
        Ok(video)
    }

    /// Upload video bytes from any async reader (a file, stdin, a byte slice)
    ///
    /// The bytes are written to exactly one temporary file in the staging
    /// directory, that file's path is uploaded, and the file is removed
    /// afterwards whether or not the upload succeeded.
    pub async fn create_video_from_reader<R>(
        &self,
        metadata: &VideoMetadata,
        mut reader: R,
        extension: &str,
    ) -> Result<Video>
    where
        R: AsyncRead + Unpin,
    {
        self.access_token()?;

        let staging = self.config.staging_path();
        tokio::fs::create_dir_all(&staging).await?;
        let staged = tempfile::Builder::new()
            .prefix("socialdash-upload-")
            .suffix(&format!(".{}", extension.trim_start_matches('.')))
            .tempfile_in(&staging)?;

        let mut file = tokio::fs::File::from_std(staged.as_file().try_clone()?);
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tracing::debug!("Staged {} bytes at {}", written, staged.path().display());

        let result = self.create_video(metadata, staged.path()).await;

        if let Err(e) = staged.close() {
            tracing::warn!("Failed to remove staged upload: {}", e);
        }
        result
    }

    /// Videos on the authenticated channel, newest first
    pub async fn list_my_videos(&self, max_results: u32) -> Result<VideoList> {
        let request = ApiRequest::get(format!("{}/search", self.config.api_base))
            .query("part", "snippet")
            .query("forMine", "true")
            .query("type", "video")
            .query("order", "date")
            .query("maxResults", max_results.clamp(1, 50))
            .bearer(self.access_token()?);

        let response = self.send(request, "listing videos").await?;
        let list: VideoList = response.json("listing videos")?;
        tracing::info!("Retrieved {} videos", list.items.len());
        Ok(list)
    }

    /// Snippet, statistics and status of one video; `None` if there is no
    /// such video
    pub async fn read_video(&self, video_id: &str) -> Result<Option<Video>> {
        self.fetch_video(video_id, "snippet,statistics,status").await
    }

    /// Change a video's title and description
    ///
    /// The update replaces the whole snippet, so the current category and
    /// tags are read first and sent back unchanged.
    pub async fn update_video(
        &self,
        video_id: &str,
        title: &str,
        description: &str,
    ) -> Result<Video> {
        if title.trim().is_empty() {
            return Err(DashError::InvalidInput("Video title cannot be empty".to_string()));
        }

        let current = self
            .fetch_video(video_id, "snippet")
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("YouTube video {}", video_id)))?;
        let snippet = current.snippet.unwrap_or_default();

        let mut body = Map::new();
        body.insert("title".to_string(), json!(title));
        body.insert("description".to_string(), json!(description));
        body.insert(
            "categoryId".to_string(),
            json!(snippet
                .category_id
                .unwrap_or_else(|| self.config.category_id.clone())),
        );
        for field in PRESERVED_SNIPPET_FIELDS {
            if let Some(value) = snippet.extra.get(*field) {
                body.insert(field.to_string(), value.clone());
            }
        }

        let request = ApiRequest::put(format!("{}/videos", self.config.api_base))
            .query("part", "snippet")
            .bearer(self.access_token()?)
            .json(json!({ "id": current.id, "snippet": body }));

        let response = self.send(request, "updating video").await?;
        let video: Video = response.json("updating video")?;
        tracing::info!("Video {} updated successfully", video.id);
        Ok(video)
    }

    /// Delete a video
    pub async fn delete_video(&self, video_id: &str) -> Result<bool> {
        let video_id = validate_video_id(video_id)?;
        let request = ApiRequest::delete(format!("{}/videos", self.config.api_base))
            .query("id", video_id)
            .bearer(self.access_token()?);

        // 204 No Content on success; failures are mapped to errors by send
        self.send(request, "deleting video").await?;
        tracing::info!("Video {} deleted successfully", video_id);
        Ok(true)
    }

    /// Current snippet of a video, for pre-filling an update
    pub async fn video_snippet(&self, video_id: &str) -> Result<Option<VideoSnippet>> {
        Ok(self
            .fetch_video(video_id, "snippet")
            .await?
            .and_then(|v| v.snippet))
    }

    async fn fetch_video(&self, video_id: &str, parts: &str) -> Result<Option<Video>> {
        let video_id = validate_video_id(video_id)?;
        let request = ApiRequest::get(format!("{}/videos", self.config.api_base))
            .query("part", parts)
            .query("id", video_id)
            .bearer(self.access_token()?);

        let response = self.send(request, "reading video").await?;
        let items: VideoItems = response.json("reading video")?;
        Ok(items.items.into_iter().next())
    }

    async fn channel(&self) -> Result<Identity> {
        let request = ApiRequest::get(format!("{}/channels", self.config.api_base))
            .query("part", "snippet")
            .query("mine", "true")
            .bearer(self.access_token()?);

        let response = self.send(request, "authentication").await?;
        let channels: Channels = response.json("authentication")?;
        let channel = channels.items.into_iter().next().ok_or_else(|| {
            PlatformError::Authentication("This Google account has no YouTube channel".to_string())
        })?;

        Ok(Identity {
            platform: PlatformKind::YouTube,
            id: channel.id,
            username: channel.snippet.map(|s| s.title),
        })
    }

    fn access_token(&self) -> Result<&str> {
        self.token
            .as_ref()
            .map(|t| t.access_token.as_str())
            .ok_or_else(|| PlatformError::Authentication("Not authenticated".to_string()).into())
    }

    async fn send(&self, request: ApiRequest, context: &str) -> Result<ApiResponse> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(map_youtube_error(&response, context))
        }
    }
}

fn validate_video_id(video_id: &str) -> Result<&str> {
    let id = video_id.trim();
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DashError::InvalidInput(format!(
            "Invalid video ID '{}'",
            video_id
        )));
    }
    Ok(id)
}

#[async_trait]
impl Platform for YouTubeOperations {
    fn kind(&self) -> PlatformKind {
        PlatformKind::YouTube
    }

    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn verify(&self) -> Result<Identity> {
        self.channel().await
    }
}
