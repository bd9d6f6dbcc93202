//! Google OAuth 2.0 for YouTube
//!
//! Implements the Device Authorization Grant (RFC 8628) against Google's
//! OAuth endpoints, refresh-token renewal, and a small on-disk token cache.
//!
//! ## Flow
//!
//! 1. **Start**: POST `/device/code` for a device code and a user code
//! 2. **Display**: show the user the verification URL and the user code
//! 3. **Poll**: POST `/token` until the user approves or the code expires
//! 4. **Cache**: write the token (with its refresh token) to the cache file

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{DashError, PlatformError, Result};
use crate::platforms::{unix_now, vendor_message};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Full read/write access to the user's YouTube account
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Treat tokens this close to expiry as expired
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// A cached access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp at which `access_token` stops working
    pub expires_at: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_LEEWAY_SECS <= now
    }
}

/// Token cache file
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token
    ///
    /// A missing file is `None`. An unreadable or corrupted file is logged
    /// and also treated as `None`, so the caller falls back to a fresh
    /// consent flow.
    pub fn load(&self) -> Option<StoredToken> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Ignoring corrupted token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write the token, creating parent directories; the file is readable
    /// by the owner only on Unix
    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| DashError::InvalidInput(format!("Failed to serialize token: {}", e)))?;
        std::fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        tracing::debug!("Saved YouTube token to {}", self.path.display());
        Ok(())
    }

    /// Remove the cached token, if any
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Device flow start response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    /// Code the user types at the verification URL
    pub user_code: String,
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    /// Seconds until the codes expire
    pub expires_in: u64,
    /// Minimum polling interval in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// Device flow poll result
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// User has not approved yet
    Pending,
    /// Polling too fast
    SlowDown,
    Approved(StoredToken),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: unix_now() + self.expires_in,
            scope: self.scope,
        }
    }
}

/// Google OAuth client for one installed app
pub struct GoogleOAuth {
    transport: Arc<dyn Transport>,
    oauth_base: String,
    client_id: String,
    client_secret: SecretString,
}

impl GoogleOAuth {
    pub fn new(
        transport: Arc<dyn Transport>,
        oauth_base: &str,
        client_id: impl Into<String>,
        client_secret: &str,
    ) -> Self {
        Self {
            transport,
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.to_string()),
        }
    }

    /// Ask Google for a device code
    pub async fn start_device_flow(&self) -> Result<DeviceCode> {
        tracing::debug!("Starting Google device flow");

        let request = ApiRequest::post(format!("{}/device/code", self.oauth_base)).form(vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("scope".to_string(), YOUTUBE_SCOPE.to_string()),
        ]);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(oauth_error(&response, "starting device flow"));
        }

        let code: DeviceCode = response.json("starting device flow")?;
        tracing::debug!(
            user_code = %code.user_code,
            verification_url = %code.verification_url,
            expires_in = code.expires_in,
            "Device flow started"
        );
        Ok(code)
    }

    /// Check once whether the user has approved `code`
    pub async fn poll(&self, code: &DeviceCode) -> Result<PollResult> {
        let request = ApiRequest::post(format!("{}/token", self.oauth_base)).form(vec![
            ("client_id".to_string(), self.client_id.clone()),
            (
                "client_secret".to_string(),
                self.client_secret.expose_secret().to_string(),
            ),
            ("device_code".to_string(), code.device_code.clone()),
            ("grant_type".to_string(), DEVICE_GRANT.to_string()),
        ]);

        let response = self.transport.send(request).await?;
        if response.is_success() {
            let token: TokenResponse = response.json("completing device flow")?;
            tracing::debug!("Device flow completed");
            return Ok(PollResult::Approved(token.into_stored(None)));
        }

        let body = response.json_value();
        match body.get("error").and_then(|e| e.as_str()) {
            Some("authorization_pending") => Ok(PollResult::Pending),
            Some("slow_down") => Ok(PollResult::SlowDown),
            Some("access_denied") => Err(PlatformError::Authentication(
                "YouTube access was denied in the consent screen".to_string(),
            )
            .into()),
            Some("expired_token") => Err(PlatformError::Authentication(
                "The YouTube device code expired before it was approved".to_string(),
            )
            .into()),
            _ => Err(oauth_error(&response, "completing device flow")),
        }
    }

    /// Run the whole device flow
    ///
    /// `on_code` is called once with the code to show the user. Polls at the
    /// interval Google asks for until the user approves, denies, or the code
    /// expires.
    pub async fn run_device_flow<F>(&self, on_code: F) -> Result<StoredToken>
    where
        F: FnOnce(&DeviceCode),
    {
        let code = self.start_device_flow().await?;
        on_code(&code);

        let mut interval = Duration::from_secs(code.interval);
        let deadline = Instant::now() + Duration::from_secs(code.expires_in);

        loop {
            if Instant::now() > deadline {
                return Err(PlatformError::Authentication(
                    "The YouTube device code expired before it was approved".to_string(),
                )
                .into());
            }

            tokio::time::sleep(interval).await;

            match self.poll(&code).await? {
                PollResult::Pending => continue,
                PollResult::SlowDown => {
                    interval += Duration::from_secs(5);
                    continue;
                }
                PollResult::Approved(token) => return Ok(token),
            }
        }
    }

    /// Trade the refresh token for a new access token
    pub async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            PlatformError::Authentication("Cached YouTube token has no refresh token".to_string())
        })?;

        tracing::debug!("Refreshing YouTube access token");
        let request = ApiRequest::post(format!("{}/token", self.oauth_base)).form(vec![
            ("client_id".to_string(), self.client_id.clone()),
            (
                "client_secret".to_string(),
                self.client_secret.expose_secret().to_string(),
            ),
            ("refresh_token".to_string(), refresh_token.clone()),
            ("grant_type".to_string(), "refresh_token".to_string()),
        ]);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(oauth_error(&response, "refreshing token"));
        }

        let fresh: TokenResponse = response.json("refreshing token")?;
        Ok(fresh.into_stored(Some(refresh_token)))
    }
}

fn oauth_error(response: &ApiResponse, context: &str) -> DashError {
    let detail = vendor_message(&response.json_value(), &response.text());
    let error = match response.status {
        429 => PlatformError::rate_limit(
            format!("Google OAuth rate limit during {}: {}", context, detail),
            None,
        ),
        400..=499 => PlatformError::Authentication(format!(
            "Google OAuth failed during {}: {}",
            context, detail
        )),
        status => PlatformError::Api(format!(
            "Google OAuth returned HTTP {} during {}: {}",
            status, context, detail
        )),
    };
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    fn oauth(transport: &Arc<MockTransport>) -> GoogleOAuth {
        GoogleOAuth::new(
            transport.clone(),
            "https://oauth2.example.test/",
            "client-id.apps.googleusercontent.com",
            "shh",
        )
    }

    fn device_code(interval: u64) -> serde_json::Value {
        json!({
            "device_code": "AH-1Ng3",
            "user_code": "GQVQ-JKEC",
            "verification_url": "https://www.google.com/device",
            "expires_in": 1800,
            "interval": interval
        })
    }

    #[test]
    fn test_token_expiry_has_leeway() {
        let token = StoredToken {
            access_token: "ya29".to_string(),
            refresh_token: None,
            expires_at: 1_000,
            scope: None,
        };
        assert!(!token.is_expired(900));
        assert!(token.is_expired(950));
        assert!(token.is_expired(2_000));
    }

    #[test]
    fn test_cache_roundtrip_and_permissions() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path().join("nested").join("token.json"));
        assert!(cache.load().is_none());

        let token = StoredToken {
            access_token: "ya29.a0".to_string(),
            refresh_token: Some("1//0g".to_string()),
            expires_at: 1_700_000_000,
            scope: Some(YOUTUBE_SCOPE.to_string()),
        };
        cache.save(&token).unwrap();
        assert_eq!(cache.load(), Some(token));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        cache.clear().unwrap();
        assert!(!cache.path().exists());
        cache.clear().unwrap();
    }

    #[test]
    fn test_corrupted_cache_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(TokenCache::new(path).load().is_none());
    }

    #[tokio::test]
    async fn test_device_flow_polls_until_approved() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(200, device_code(0))
            .push_json(428, json!({"error": "authorization_pending"}))
            .push_json(
                200,
                json!({
                    "access_token": "ya29.fresh",
                    "expires_in": 3599,
                    "refresh_token": "1//refresh",
                    "scope": YOUTUBE_SCOPE,
                    "token_type": "Bearer"
                }),
            );

        let mut shown = None;
        let token = oauth(&transport)
            .run_device_flow(|code| shown = Some(code.user_code.clone()))
            .await
            .unwrap();

        assert_eq!(shown.as_deref(), Some("GQVQ-JKEC"));
        assert_eq!(token.access_token, "ya29.fresh");
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));

        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://oauth2.example.test/device/code");
        assert_eq!(requests[0].form_value("scope"), Some(YOUTUBE_SCOPE));
        assert_eq!(requests[2].form_value("grant_type"), Some(DEVICE_GRANT));
    }

    #[tokio::test]
    async fn test_device_flow_denied() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(200, device_code(0))
            .push_json(403, json!({"error": "access_denied"}));

        let err = oauth(&transport).run_device_flow(|_| {}).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("denied"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({"access_token": "ya29.new", "expires_in": 3599}));

        let old = StoredToken {
            access_token: "ya29.old".to_string(),
            refresh_token: Some("1//keep".to_string()),
            expires_at: 0,
            scope: None,
        };
        let fresh = oauth(&transport).refresh(&old).await.unwrap();

        assert_eq!(fresh.access_token, "ya29.new");
        assert_eq!(fresh.refresh_token.as_deref(), Some("1//keep"));
        assert!(!fresh.is_expired(unix_now()));
        assert_eq!(
            transport.requests()[0].form_value("refresh_token"),
            Some("1//keep")
        );
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails() {
        let transport = Arc::new(MockTransport::new());
        let token = StoredToken {
            access_token: "x".to_string(),
            refresh_token: None,
            expires_at: 0,
            scope: None,
        };
        let err = oauth(&transport).refresh(&token).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(transport.request_count(), 0);
    }
}
