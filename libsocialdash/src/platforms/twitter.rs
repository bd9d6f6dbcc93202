//! Twitter/X platform implementation (API v2)
//!
//! User-context calls are signed with OAuth 1.0a; single-tweet reads use the
//! app bearer token. Every response's `x-rate-limit-*` headers are recorded
//! per endpoint, and each operation checks the endpoint it is about to call
//! before calling it. An exhausted endpoint is skipped: create and read give
//! `None`, listing gives an empty list, delete gives `false`.
//!
//! The recorded windows are kept in a small JSON file (`[twitter]
//! quota_file`), so a window used up by one run still holds for the next.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::{Config, TwitterConfig};
use crate::credentials::TwitterCredentials;
use crate::error::{DashError, PlatformError, Result};
use crate::platforms::oauth1::OAuth1Signer;
use crate::platforms::{unix_now, vendor_message, Platform};
use crate::rate_limit::{
    format_reset_time, run_with_rate_limit_wait, HeaderScheme, QuotaTable, WaitPolicy,
};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::{Identity, PlatformKind, Tweet, TwitterUser};

pub const USERS_ME: &str = "GET /2/users/me";
pub const CREATE_TWEET: &str = "POST /2/tweets";
pub const GET_TWEET: &str = "GET /2/tweets/:id";
pub const USER_TWEETS: &str = "GET /2/users/:id/tweets";
pub const DELETE_TWEET: &str = "DELETE /2/tweets/:id";

/// Window Twitter uses for its quotas, assumed when a 429 carries no reset
const DEFAULT_WINDOW_SECS: i64 = 15 * 60;

const TWEET_FIELDS: &str = "created_at,public_metrics";

/// Map a non-success Twitter response to a typed error
fn map_twitter_error(response: &ApiResponse, context: &str) -> DashError {
    let body = response.json_value();
    let detail = vendor_message(&body, &response.text());

    let error = match response.status {
        401 | 403 => PlatformError::Authentication(format!(
            "Twitter rejected the credentials during {}: {}",
            context, detail
        )),
        429 => {
            let reset_at = response
                .header("x-rate-limit-reset")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_else(|| unix_now() + DEFAULT_WINDOW_SECS);
            PlatformError::rate_limit(
                format!("Twitter rate limit exceeded during {}: {}", context, detail),
                Some(reset_at),
            )
        }
        404 => PlatformError::NotFound(format!("Twitter {}: {}", context, detail)),
        400..=499 => PlatformError::Validation(format!(
            "Twitter rejected the request during {}: {}",
            context, detail
        )),
        status => PlatformError::Api(format!(
            "Twitter returned HTTP {} during {}: {}",
            status, context, detail
        )),
    };

    error.into()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Deleted {
    deleted: bool,
}

pub struct TwitterManager {
    transport: Arc<dyn Transport>,
    api_base: String,
    signer: OAuth1Signer,
    bearer_token: SecretString,
    quotas: QuotaTable,
    quota_file: PathBuf,
    user: TwitterUser,
}

impl TwitterManager {
    /// Read credentials from the environment and connect over HTTP
    pub async fn from_env(config: &Config) -> Result<Self> {
        let creds = TwitterCredentials::from_env()?;
        let transport = Arc::new(HttpTransport::new(&config.http)?);
        Self::connect(creds, &config.twitter, transport).await
    }

    /// Build a manager and verify the credentials with `users/me`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if Twitter rejects the
    /// credentials, or the rate-limit error if the identity check itself is
    /// throttled.
    pub async fn connect(
        creds: TwitterCredentials,
        config: &TwitterConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let signer = OAuth1Signer::from_credentials(&creds);
        let api_base = config.api_base.trim_end_matches('/').to_string();
        let quota_file = config.quota_path();
        let quotas = QuotaTable::load(&quota_file);

        let store = QuotaStore {
            table: &quotas,
            file: &quota_file,
        };
        let user = fetch_me(transport.as_ref(), &signer, &api_base, store).await?;
        tracing::info!(
            "Twitter API v2 authentication successful for @{}",
            user.username.as_deref().unwrap_or(&user.id)
        );

        Ok(Self {
            transport,
            api_base,
            signer,
            bearer_token: creds.bearer_token,
            quotas,
            quota_file,
            user,
        })
    }

    /// The authenticated account
    pub fn user(&self) -> &TwitterUser {
        &self.user
    }

    pub fn quotas(&self) -> &QuotaTable {
        &self.quotas
    }

    /// Reset time of `endpoint` if its quota is used up, `None` if a call
    /// may go ahead
    pub fn check_rate_limit_status(&self, endpoint: &str) -> Option<i64> {
        let reset_at = self.quotas.check(endpoint, unix_now())?;
        tracing::warn!(
            "Rate limit exceeded for {}. Please wait until {} before retrying.",
            endpoint,
            format_reset_time(reset_at)
        );
        Some(reset_at)
    }

    /// Post a new tweet
    ///
    /// Returns the created tweet (`id` exactly as Twitter assigned it), or
    /// `None` when the create quota is exhausted.
    pub async fn create_tweet(&self, text: &str) -> Result<Option<Tweet>> {
        if text.trim().is_empty() {
            return Err(DashError::InvalidInput("Tweet text cannot be empty".to_string()));
        }
        if self.check_rate_limit_status(CREATE_TWEET).is_some() {
            return Ok(None);
        }

        tracing::debug!("Creating tweet: {} characters", text.chars().count());

        let request = ApiRequest::post(self.url("/2/tweets")).json(json!({ "text": text }));
        let response = self
            .send_signed(CREATE_TWEET, request, "creating tweet")
            .await?;

        let envelope: Envelope<Tweet> = response.json("creating tweet")?;
        let tweet = envelope.data.ok_or_else(|| {
            PlatformError::Api("Twitter did not return the created tweet".to_string())
        })?;

        tracing::info!("Tweet created successfully! Tweet ID: {}", tweet.id);
        Ok(Some(tweet))
    }

    /// Fetch one tweet with its creation time and public metrics
    ///
    /// `None` when the tweet does not exist or the read quota is exhausted.
    pub async fn get_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>> {
        let tweet_id = validate_id(tweet_id)?;
        if self.check_rate_limit_status(GET_TWEET).is_some() {
            return Ok(None);
        }

        let request = ApiRequest::get(self.url(&format!("/2/tweets/{}", tweet_id)))
            .query("tweet.fields", TWEET_FIELDS)
            .bearer(self.bearer_token.expose_secret());

        let response = match self.send(GET_TWEET, request, "fetching tweet").await {
            Ok(response) => response,
            Err(DashError::Platform(PlatformError::NotFound(_))) => return Ok(None),
            Err(e) => return Err(e),
        };

        // Unknown ids come back as 200 with an `errors` array and no data
        let envelope: Envelope<Tweet> = response.json("fetching tweet")?;
        match &envelope.data {
            Some(tweet) => tracing::info!("Tweet fetched successfully! Content: {}", tweet.text),
            None => tracing::info!("Tweet {} not found", tweet_id),
        }
        Ok(envelope.data)
    }

    /// The authenticated user's most recent tweets, newest first
    ///
    /// Twitter only accepts page sizes from 5 to 100, so smaller requests
    /// are trimmed locally. Empty when the timeline quota is exhausted.
    pub async fn get_my_tweets(&self, max_results: usize) -> Result<Vec<Tweet>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        if self.check_rate_limit_status(USER_TWEETS).is_some() {
            return Ok(Vec::new());
        }

        let page_size = max_results.clamp(5, 100);
        let request = ApiRequest::get(self.url(&format!("/2/users/{}/tweets", self.user.id)))
            .query("max_results", page_size)
            .query("tweet.fields", TWEET_FIELDS);

        let response = self
            .send_signed(USER_TWEETS, request, "fetching recent tweets")
            .await?;

        let envelope: Envelope<Vec<Tweet>> = response.json("fetching recent tweets")?;
        let mut tweets = envelope.data.unwrap_or_default();
        tweets.truncate(max_results);

        tracing::info!("Retrieved {} tweets", tweets.len());
        Ok(tweets)
    }

    /// Replace a tweet's text by deleting it and posting the new text
    ///
    /// Twitter has no edit endpoint. Both quotas are checked up front so a
    /// delete is never followed by a skipped create. A live rate limit on
    /// either step is waited out under `policy` (`on_wait` gets the
    /// countdown) and only that step is sent again, so a confirmed delete is
    /// never repeated. Returns the new tweet, or `None` if a quota was used
    /// up or the old tweet could not be deleted.
    pub async fn update_tweet<W>(
        &self,
        tweet_id: &str,
        new_text: &str,
        policy: &WaitPolicy,
        mut on_wait: W,
    ) -> Result<Option<Tweet>>
    where
        W: FnMut(Duration),
    {
        let tweet_id = validate_id(tweet_id)?;
        if new_text.trim().is_empty() {
            return Err(DashError::InvalidInput("Tweet text cannot be empty".to_string()));
        }
        if self.check_rate_limit_status(DELETE_TWEET).is_some()
            || self.check_rate_limit_status(CREATE_TWEET).is_some()
        {
            return Ok(None);
        }

        let deleted =
            run_with_rate_limit_wait(policy, || self.delete_tweet(tweet_id), &mut on_wait).await?;
        if !deleted {
            tracing::warn!("Tweet {} was not deleted; not posting the replacement", tweet_id);
            return Ok(None);
        }

        let created =
            run_with_rate_limit_wait(policy, || self.create_tweet(new_text), &mut on_wait).await;
        if let Err(e) = &created {
            tracing::error!(
                "Tweet {} was deleted but its replacement was not posted: {}",
                tweet_id,
                e
            );
        }
        created
    }

    /// Delete a tweet
    ///
    /// `true` when Twitter confirms the deletion, `false` when it does not
    /// or when the delete quota is exhausted.
    pub async fn delete_tweet(&self, tweet_id: &str) -> Result<bool> {
        let tweet_id = validate_id(tweet_id)?;
        if self.check_rate_limit_status(DELETE_TWEET).is_some() {
            return Ok(false);
        }

        let request = ApiRequest::delete(self.url(&format!("/2/tweets/{}", tweet_id)));
        let response = self
            .send_signed(DELETE_TWEET, request, "deleting tweet")
            .await?;

        let envelope: Envelope<Deleted> = response.json("deleting tweet")?;
        let deleted = envelope.data.map(|d| d.deleted).unwrap_or(false);

        if deleted {
            tracing::info!("Tweet {} deleted successfully", tweet_id);
        } else {
            tracing::warn!("Twitter did not confirm deletion of tweet {}", tweet_id);
        }
        Ok(deleted)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send_signed(
        &self,
        endpoint: &str,
        request: ApiRequest,
        context: &str,
    ) -> Result<ApiResponse> {
        let request = self.signer.sign(request)?;
        self.send(endpoint, request, context).await
    }

    async fn send(
        &self,
        endpoint: &str,
        request: ApiRequest,
        context: &str,
    ) -> Result<ApiResponse> {
        send_and_observe(self.transport.as_ref(), self.quota_store(), endpoint, request, context)
            .await
    }

    fn quota_store(&self) -> QuotaStore<'_> {
        QuotaStore {
            table: &self.quotas,
            file: &self.quota_file,
        }
    }
}

/// The in-memory table and the file it is mirrored to
#[derive(Clone, Copy)]
struct QuotaStore<'a> {
    table: &'a QuotaTable,
    file: &'a Path,
}

async fn send_and_observe(
    transport: &dyn Transport,
    quotas: QuotaStore<'_>,
    endpoint: &str,
    request: ApiRequest,
    context: &str,
) -> Result<ApiResponse> {
    let response = transport.send(request).await?;
    let now = unix_now();
    if quotas.table.observe(endpoint, HeaderScheme::Twitter, &response, now) {
        if let Err(e) = quotas.table.save(quotas.file, now) {
            tracing::warn!(
                "Failed to save rate-limit state to {}: {}",
                quotas.file.display(),
                e
            );
        }
    }

    if response.is_success() {
        Ok(response)
    } else {
        Err(map_twitter_error(&response, context))
    }
}

async fn fetch_me(
    transport: &dyn Transport,
    signer: &OAuth1Signer,
    api_base: &str,
    quotas: QuotaStore<'_>,
) -> Result<TwitterUser> {
    let request = signer.sign(ApiRequest::get(format!("{}/2/users/me", api_base)))?;
    let response = send_and_observe(transport, quotas, USERS_ME, request, "authentication")
        .await
        .map_err(|e| match e {
            // users/me only 404s when the token is not tied to a user
            DashError::Platform(PlatformError::NotFound(msg)) => {
                PlatformError::Authentication(msg).into()
            }
            other => other,
        })?;

    let envelope: Envelope<TwitterUser> = response.json("authentication")?;
    envelope.data.ok_or_else(|| {
        PlatformError::Authentication("Twitter did not return the authenticated user".to_string())
            .into()
    })
}

fn validate_id(tweet_id: &str) -> Result<&str> {
    let tweet_id = tweet_id.trim();
    if tweet_id.is_empty() || !tweet_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(DashError::InvalidInput(format!(
            "Invalid tweet ID '{}': expected a numeric ID",
            tweet_id
        )));
    }
    Ok(tweet_id)
}

#[async_trait]
impl Platform for TwitterManager {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Twitter
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    async fn verify(&self) -> Result<Identity> {
        let user = fetch_me(
            self.transport.as_ref(),
            &self.signer,
            &self.api_base,
            self.quota_store(),
        )
        .await?;

        Ok(Identity {
            platform: PlatformKind::Twitter,
            id: user.id,
            username: user.username,
        })
    }
}
