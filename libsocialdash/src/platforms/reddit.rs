//! Reddit platform implementation (OAuth API, script app)
//!
//! A script app trades the client pair and the user's password for a bearer
//! token once, at construction. Every call sends the configured User-Agent,
//! which Reddit requires to be unique per app. Quota windows from the
//! `x-ratelimit-*` headers are recorded per endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{Config, RedditConfig};
use crate::credentials::RedditCredentials;
use crate::error::{DashError, PlatformError, Result};
use crate::platforms::{unix_now, vendor_message, Platform};
use crate::rate_limit::{HeaderScheme, QuotaTable};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::{Identity, PlatformKind, RedditPost, RedditPostKind};

const ME: &str = "GET /api/v1/me";
const SUBMIT: &str = "POST /api/submit";
const BY_ID: &str = "GET /by_id/:id";
const EDIT: &str = "POST /api/editusertext";
const DELETE: &str = "POST /api/del";
const SUBMITTED: &str = "GET /user/:name/submitted";

/// Map a non-success Reddit response to a typed error
fn map_reddit_error(response: &ApiResponse, context: &str) -> DashError {
    let body = response.json_value();
    let detail = vendor_message(&body, &response.text());

    let error = match response.status {
        401 | 403 => PlatformError::Authentication(format!(
            "Reddit rejected the request during {}: {}",
            context, detail
        )),
        429 => {
            let reset_in = response
                .header("x-ratelimit-reset")
                .and_then(|v| v.trim().parse::<i64>().ok());
            PlatformError::rate_limit(
                format!("Reddit rate limit exceeded during {}: {}", context, detail),
                reset_in.map(|secs| unix_now() + secs),
            )
        }
        404 => PlatformError::NotFound(format!("Reddit {}: {}", context, detail)),
        400..=499 => PlatformError::Validation(format!(
            "Reddit rejected the request during {}: {}",
            context, detail
        )),
        status => PlatformError::Api(format!(
            "Reddit returned HTTP {} during {}: {}",
            status, context, detail
        )),
    };

    error.into()
}

/// Reddit's `api_type=json` envelope: `{"json": {"errors": [...], "data": ...}}`
#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    json: JsonBody,
}

#[derive(Debug, Deserialize)]
struct JsonBody {
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonBody {
    /// Errors as "CODE: message" strings
    fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| match e.as_array() {
                Some(parts) => parts
                    .iter()
                    .take(2)
                    .filter_map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(": "),
                None => e.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: RedditPost,
}

impl Listing {
    fn into_posts(self) -> Vec<RedditPost> {
        self.data.children.into_iter().map(|t| t.data).collect()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Me {
    id: String,
    name: String,
}

pub struct RedditManager {
    transport: Arc<dyn Transport>,
    api_base: String,
    user_agent: String,
    token: SecretString,
    username: String,
    quotas: QuotaTable,
}

impl RedditManager {
    pub async fn from_env(config: &Config) -> Result<Self> {
        let creds = RedditCredentials::from_env()?;
        let transport = Arc::new(HttpTransport::new(&config.http)?);
        Self::connect(creds, &config.reddit, transport).await
    }

    /// Obtain a bearer token with the password grant and check who it
    /// belongs to
    pub async fn connect(
        creds: RedditCredentials,
        config: &RedditConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let token = fetch_token(transport.as_ref(), &creds, config).await?;

        let manager = Self {
            transport,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            user_agent: creds.user_agent,
            token,
            username: creds.username,
            quotas: QuotaTable::new(),
        };

        let me = manager.me().await?;
        if !me.name.eq_ignore_ascii_case(&manager.username) {
            tracing::warn!(
                "Reddit token belongs to u/{}, not the configured u/{}",
                me.name,
                manager.username
            );
        }
        tracing::info!("Reddit authentication successful for u/{}", me.name);

        Ok(manager)
    }

    pub fn quotas(&self) -> &QuotaTable {
        &self.quotas
    }

    /// Submit a post and return the id Reddit assigned to it
    ///
    /// `content` is the body for text posts and the URL for link and image
    /// posts.
    pub async fn create_post(
        &self,
        subreddit: &str,
        title: &str,
        content: &str,
        kind: RedditPostKind,
    ) -> Result<String> {
        let subreddit = normalize_subreddit(subreddit)?;
        if title.trim().is_empty() {
            return Err(DashError::InvalidInput("Post title cannot be empty".to_string()));
        }

        let mut form = vec![
            ("api_type".to_string(), "json".to_string()),
            ("sr".to_string(), subreddit.to_string()),
            ("title".to_string(), title.to_string()),
            ("kind".to_string(), kind.submit_kind().to_string()),
        ];
        match kind {
            RedditPostKind::Text => form.push(("text".to_string(), content.to_string())),
            RedditPostKind::Link | RedditPostKind::Image => {
                let url = content.trim();
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(DashError::InvalidInput(format!(
                        "A {} post needs an http(s) URL as its content",
                        kind
                    )));
                }
                form.push(("url".to_string(), url.to_string()));
            }
        }

        tracing::debug!("Submitting {} post to r/{}", kind, subreddit);
        let request = self.api(ApiRequest::post(self.url("/api/submit")).form(form));
        let response = self.send(SUBMIT, request, "creating post").await?;

        let envelope: JsonEnvelope = response.json("creating post")?;
        let errors = envelope.json.error_messages();
        if !errors.is_empty() {
            return Err(PlatformError::Validation(errors.join("; ")).into());
        }

        let id = envelope
            .json
            .data
            .as_ref()
            .and_then(|d| d.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::Api("Reddit did not return the new post id".to_string()))?
            .to_string();

        tracing::info!("Post created successfully! Post ID: {}", id);
        Ok(id)
    }

    /// Fetch one post; `None` if Reddit does not know the id
    pub async fn read_post(&self, post_id: &str) -> Result<Option<RedditPost>> {
        let post_id = normalize_post_id(post_id)?;
        let request = self.api(ApiRequest::get(self.url(&format!("/by_id/t3_{}", post_id))));

        let response = match self.send(BY_ID, request, "reading post").await {
            Ok(response) => response,
            Err(DashError::Platform(PlatformError::NotFound(_))) => return Ok(None),
            Err(e) => return Err(e),
        };

        let listing: Listing = response.json("reading post")?;
        Ok(listing.into_posts().into_iter().next())
    }

    /// Replace the body of a text post
    ///
    /// `false` when Reddit refuses the edit (e.g., link posts have no body).
    pub async fn update_post(&self, post_id: &str, new_content: &str) -> Result<bool> {
        let post_id = normalize_post_id(post_id)?;
        let form = vec![
            ("api_type".to_string(), "json".to_string()),
            ("thing_id".to_string(), format!("t3_{}", post_id)),
            ("text".to_string(), new_content.to_string()),
        ];

        let request = self.api(ApiRequest::post(self.url("/api/editusertext")).form(form));
        let response = self.send(EDIT, request, "updating post").await?;

        let envelope: JsonEnvelope = response.json("updating post")?;
        let errors = envelope.json.error_messages();
        if !errors.is_empty() {
            tracing::warn!("Reddit refused to edit {}: {}", post_id, errors.join("; "));
            return Ok(false);
        }

        tracing::info!("Post {} updated successfully", post_id);
        Ok(true)
    }

    /// Delete a post
    pub async fn delete_post(&self, post_id: &str) -> Result<bool> {
        let post_id = normalize_post_id(post_id)?;
        let form = vec![("id".to_string(), format!("t3_{}", post_id))];

        let request = self.api(ApiRequest::post(self.url("/api/del")).form(form));
        self.send(DELETE, request, "deleting post").await?;

        tracing::info!("Post {} deleted successfully", post_id);
        Ok(true)
    }

    /// The account's most recent submissions, newest first
    pub async fn get_recent_posts(&self, limit: u32) -> Result<Vec<RedditPost>> {
        let request = self.api(
            ApiRequest::get(self.url(&format!("/user/{}/submitted", self.username)))
                .query("limit", limit.clamp(1, 100))
                .query("sort", "new"),
        );
        let response = self.send(SUBMITTED, request, "listing recent posts").await?;

        let listing: Listing = response.json("listing recent posts")?;
        let posts = listing.into_posts();
        tracing::info!("Retrieved {} recent posts", posts.len());
        Ok(posts)
    }

    async fn me(&self) -> Result<Me> {
        let request = self.api(ApiRequest::get(self.url("/api/v1/me")));
        let response = self.send(ME, request, "authentication").await?;
        response.json("authentication")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn api(&self, request: ApiRequest) -> ApiRequest {
        request
            .bearer(self.token.expose_secret())
            .header("User-Agent", self.user_agent.clone())
            .query("raw_json", 1)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: ApiRequest,
        context: &str,
    ) -> Result<ApiResponse> {
        let response = self.transport.send(request).await?;
        self.quotas
            .observe(endpoint, HeaderScheme::Reddit, &response, unix_now());

        if response.is_success() {
            Ok(response)
        } else {
            Err(map_reddit_error(&response, context))
        }
    }
}

async fn fetch_token(
    transport: &dyn Transport,
    creds: &RedditCredentials,
    config: &RedditConfig,
) -> Result<SecretString> {
    let basic = base64::engine::general_purpose::STANDARD.encode(format!(
        "{}:{}",
        creds.client_id,
        creds.client_secret.expose_secret()
    ));

    let request = ApiRequest::post(format!(
        "{}/api/v1/access_token",
        config.auth_base.trim_end_matches('/')
    ))
    .header("Authorization", format!("Basic {}", basic))
    .header("User-Agent", creds.user_agent.clone())
    .form(vec![
        ("grant_type".to_string(), "password".to_string()),
        ("username".to_string(), creds.username.clone()),
        ("password".to_string(), creds.password.expose_secret().to_string()),
    ]);

    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(match response.status {
            429 => map_reddit_error(&response, "authentication"),
            status => PlatformError::Authentication(format!(
                "Reddit rejected the app credentials (HTTP {}): {}",
                status,
                vendor_message(&response.json_value(), &response.text())
            ))
            .into(),
        });
    }

    // Bad username/password still comes back as 200 with an error field
    let token: TokenResponse = response.json("authentication")?;
    match (token.access_token, token.error) {
        (Some(access_token), None) => Ok(SecretString::from(access_token)),
        (_, Some(error)) => Err(PlatformError::Authentication(format!(
            "Reddit refused the password grant: {}",
            error
        ))
        .into()),
        (None, None) => Err(PlatformError::Authentication(
            "Reddit did not return an access token".to_string(),
        )
        .into()),
    }
}

/// Subreddit name without an `r/` or `/r/` prefix
pub fn normalize_subreddit(subreddit: &str) -> Result<&str> {
    let name = subreddit.trim().trim_start_matches("/r/").trim_start_matches("r/");
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DashError::InvalidInput(format!(
            "Invalid subreddit name '{}'",
            subreddit
        )));
    }
    Ok(name)
}

/// Accept both `abc123` and the fullname `t3_abc123`
fn normalize_post_id(post_id: &str) -> Result<&str> {
    let id = post_id.trim().trim_start_matches("t3_");
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DashError::InvalidInput(format!(
            "Invalid post ID '{}'",
            post_id
        )));
    }
    Ok(id)
}

#[async_trait]
impl Platform for RedditManager {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Reddit
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    async fn verify(&self) -> Result<Identity> {
        let me = self.me().await?;
        Ok(Identity {
            platform: PlatformKind::Reddit,
            id: me.id,
            username: Some(me.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_subreddit() {
        assert_eq!(normalize_subreddit("test").unwrap(), "test");
        assert_eq!(normalize_subreddit("r/rust").unwrap(), "rust");
        assert_eq!(normalize_subreddit("/r/learn_rust ").unwrap(), "learn_rust");
        assert!(normalize_subreddit("").is_err());
        assert!(normalize_subreddit("a b").is_err());
    }

    #[test]
    fn test_normalize_post_id() {
        assert_eq!(normalize_post_id("1abcde").unwrap(), "1abcde");
        assert_eq!(normalize_post_id("t3_1abcde").unwrap(), "1abcde");
        assert!(normalize_post_id("").is_err());
        assert!(normalize_post_id("../api").is_err());
    }

    #[test]
    fn test_error_messages_from_envelope() {
        let envelope: JsonEnvelope = serde_json::from_value(json!({
            "json": {
                "errors": [["SUBREDDIT_NOEXIST", "that subreddit doesn't exist", "sr"]],
                "data": null
            }
        }))
        .unwrap();
        assert_eq!(
            envelope.json.error_messages(),
            vec!["SUBREDDIT_NOEXIST: that subreddit doesn't exist".to_string()]
        );
    }

    #[test]
    fn test_map_429_uses_relative_reset() {
        let before = unix_now();
        let response =
            ApiResponse::new(429, "Too Many Requests").with_header("x-ratelimit-reset", "120");
        let reset = map_reddit_error(&response, "posting")
            .rate_limit_reset()
            .flatten()
            .unwrap();
        assert!(reset >= before + 120 && reset <= unix_now() + 120);
    }

    #[test]
    fn test_map_403_is_authentication() {
        let response = ApiResponse::json_body(403, &json!({"message": "Forbidden", "error": 403}));
        let err = map_reddit_error(&response, "deleting post");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Forbidden"));
    }
}
