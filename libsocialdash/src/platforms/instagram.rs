//! Instagram platform implementation (Graph API)
//!
//! Publishing is two calls: create a media container from a public image
//! URL, then publish the container. The access token travels as a query
//! parameter on reads and as a form field on writes, the way the Graph API
//! expects it.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::{Config, InstagramConfig};
use crate::credentials::InstagramCredentials;
use crate::error::{DashError, PlatformError, Result};
use crate::platforms::{vendor_message, Platform};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::{Identity, InstagramAccount, InstagramMedia, MediaPage, PlatformKind};

const ACCOUNT_FIELDS: &str =
    "id,username,name,biography,profile_picture_url,followers_count,follows_count,media_count";

/// Fields requested for every media object in a listing
pub const MEDIA_FIELDS: &[&str] = &[
    "id",
    "caption",
    "media_type",
    "media_url",
    "thumbnail_url",
    "permalink",
    "timestamp",
];

/// Graph API error codes that mean "slow down"
const THROTTLING_CODES: &[i64] = &[4, 17, 32, 613];

/// Map a non-success Graph API response to a typed error
///
/// The Graph API reports most failures as `{"error": {"code": N, ...}}`;
/// the code is more reliable than the HTTP status.
fn map_graph_error(response: &ApiResponse, context: &str) -> DashError {
    let body = response.json_value();
    let detail = vendor_message(&body, &response.text());
    let code = body.pointer("/error/code").and_then(|c| c.as_i64());

    let error = match (code, response.status) {
        (Some(c), _) if THROTTLING_CODES.contains(&c) => PlatformError::rate_limit(
            format!("Instagram rate limit reached during {}: {}", context, detail),
            None,
        ),
        (Some(190), _) | (Some(10), _) | (Some(200..=299), _) | (_, 401) | (_, 403) => {
            PlatformError::Authentication(format!(
                "Instagram rejected the access token during {}: {}",
                context, detail
            ))
        }
        (_, 429) => PlatformError::rate_limit(
            format!("Instagram rate limit reached during {}: {}", context, detail),
            None,
        ),
        (_, 404) => PlatformError::NotFound(format!("Instagram {}: {}", context, detail)),
        (_, 400..=499) => PlatformError::Validation(format!(
            "Instagram rejected the request during {}: {}",
            context, detail
        )),
        (_, status) => PlatformError::Api(format!(
            "Instagram returned HTTP {} during {}: {}",
            status, context, detail
        )),
    };

    error.into()
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

pub struct InstagramApi {
    transport: Arc<dyn Transport>,
    graph_base: String,
    access_token: SecretString,
    account_id: String,
    account: InstagramAccount,
}

impl InstagramApi {
    pub async fn from_env(config: &Config) -> Result<Self> {
        let creds = InstagramCredentials::from_env()?;
        let transport = Arc::new(HttpTransport::new(&config.http)?);
        Self::connect(creds, &config.instagram, transport).await
    }

    /// Build the client and check that the token can see the account
    pub async fn connect(
        creds: InstagramCredentials,
        config: &InstagramConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let graph_base = config.graph_base.trim_end_matches('/').to_string();

        let request = ApiRequest::get(format!("{}/{}", graph_base, creds.account_id))
            .query("fields", "id,username")
            .query("access_token", creds.access_token.expose_secret());
        let response = send(transport.as_ref(), request, "authentication")
            .await
            .map_err(|e| match e {
                DashError::Platform(PlatformError::NotFound(msg))
                | DashError::Platform(PlatformError::Validation(msg)) => {
                    PlatformError::Authentication(msg).into()
                }
                other => other,
            })?;
        let account: InstagramAccount = response.json("authentication")?;

        tracing::info!(
            "Instagram Graph API initialized for {}",
            account.username.as_deref().unwrap_or(&account.id)
        );

        Ok(Self {
            transport,
            graph_base,
            access_token: creds.access_token,
            account_id: creds.account_id,
            account,
        })
    }

    /// Profile details of the business account
    pub async fn get_account_info(&self) -> Result<InstagramAccount> {
        let request = self.read(&self.account_id).query("fields", ACCOUNT_FIELDS);
        let response = send(self.transport.as_ref(), request, "fetching account info").await?;
        response.json("fetching account info")
    }

    /// Create an image post and publish it
    ///
    /// `image_url` must be publicly reachable; Instagram fetches it itself.
    /// Returns the id of the published media object.
    pub async fn create_post(&self, image_url: &str, caption: &str) -> Result<String> {
        let image_url = image_url.trim();
        if !(image_url.starts_with("https://") || image_url.starts_with("http://")) {
            return Err(DashError::InvalidInput(format!(
                "Image URL must be a public http(s) URL, got '{}'",
                image_url
            )));
        }

        tracing::debug!("Creating Instagram media container for {}", image_url);
        let container = self.write(
            &format!("{}/media", self.account_id),
            vec![
                ("image_url".to_string(), image_url.to_string()),
                ("caption".to_string(), caption.to_string()),
            ],
        );
        let response =
            send(self.transport.as_ref(), container, "creating media container").await?;
        let container: Created = response.json("creating media container")?;

        tracing::debug!("Publishing Instagram container {}", container.id);
        let publish = self.write(
            &format!("{}/media_publish", self.account_id),
            vec![("creation_id".to_string(), container.id)],
        );
        let response = send(self.transport.as_ref(), publish, "publishing media").await?;
        let published: Created = response.json("publishing media")?;

        tracing::info!("Instagram post published! Media ID: {}", published.id);
        Ok(published.id)
    }

    /// Fetch selected fields of one media object
    pub async fn get_media(&self, media_id: &str, fields: &[&str]) -> Result<InstagramMedia> {
        let media_id = media_id.trim();
        if media_id.is_empty() {
            return Err(DashError::InvalidInput("Media ID cannot be empty".to_string()));
        }

        let request = self.read(media_id).query("fields", fields.join(","));
        let response = send(self.transport.as_ref(), request, "fetching media").await?;
        response.json("fetching media")
    }

    /// Most recent media of the account
    pub async fn get_media_list(&self, limit: u32) -> Result<MediaPage> {
        let request = self
            .read(&format!("{}/media", self.account_id))
            .query("fields", MEDIA_FIELDS.join(","))
            .query("limit", limit);
        let response = send(self.transport.as_ref(), request, "fetching media list").await?;
        let page: MediaPage = response.json("fetching media list")?;

        tracing::info!("Retrieved {} media objects", page.data.len());
        Ok(page)
    }

    /// Account seen at construction
    pub fn account(&self) -> &InstagramAccount {
        &self.account
    }

    fn read(&self, path: &str) -> ApiRequest {
        ApiRequest::get(format!("{}/{}", self.graph_base, path))
            .query("access_token", self.access_token.expose_secret())
    }

    fn write(&self, path: &str, mut fields: Vec<(String, String)>) -> ApiRequest {
        fields.push((
            "access_token".to_string(),
            self.access_token.expose_secret().to_string(),
        ));
        ApiRequest::post(format!("{}/{}", self.graph_base, path)).form(fields)
    }
}

async fn send(
    transport: &dyn Transport,
    request: ApiRequest,
    context: &str,
) -> Result<ApiResponse> {
    let response = transport.send(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(map_graph_error(&response, context))
    }
}

#[async_trait]
impl Platform for InstagramApi {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Instagram
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    async fn verify(&self) -> Result<Identity> {
        let account = self.get_account_info().await?;
        Ok(Identity {
            platform: PlatformKind::Instagram,
            id: account.id,
            username: account.username,
        })
    }
}
