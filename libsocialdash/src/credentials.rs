//! Per-platform credential bundles
//!
//! Every platform reads a fixed set of named values from the environment at
//! construction time. A bundle is either complete or it is not built at all:
//! the error lists every missing variable at once.
//!
//! Secret values are held as [`SecretString`] so they never show up in
//! `Debug` output or logs.
//!
//! # Example
//!
//! ```no_run
//! use libsocialdash::credentials::{self, TwitterCredentials};
//!
//! # fn example() -> libsocialdash::Result<()> {
//! credentials::load_dotenv();
//! let creds = TwitterCredentials::from_env()?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use secrecy::SecretString;

use crate::error::{ConfigError, Result};
use crate::types::PlatformKind;

/// Somewhere credential values can be looked up by name
pub trait CredentialSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment
pub struct EnvSource;

impl CredentialSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Load a `.env` file from the working directory into the process
/// environment, if one exists. Variables already set are not overridden.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }
}

/// Names of the variables a platform needs that `source` does not provide
pub fn missing_variables(platform: PlatformKind, source: &impl CredentialSource) -> Vec<String> {
    platform
        .required_variables()
        .iter()
        .filter(|key| source.get(key).is_none())
        .map(|key| key.to_string())
        .collect()
}

/// Fetch all required values for `platform`, in the order of
/// [`PlatformKind::required_variables`], or fail listing every gap
fn require(platform: PlatformKind, source: &impl CredentialSource) -> Result<Vec<String>> {
    let missing = missing_variables(platform, source);
    if !missing.is_empty() {
        return Err(ConfigError::MissingCredentials {
            platform: platform.display_name().to_string(),
            missing,
        }
        .into());
    }

    Ok(platform
        .required_variables()
        .iter()
        .filter_map(|key| source.get(key))
        .collect())
}

/// Twitter/X API credentials
///
/// The consumer key/secret pair and the user access token/secret pair sign
/// user-context requests (OAuth 1.0a); the bearer token authorizes public
/// reads.
#[derive(Debug)]
pub struct TwitterCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub bearer_token: SecretString,
    pub access_token: String,
    pub access_token_secret: SecretString,
}

impl TwitterCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &impl CredentialSource) -> Result<Self> {
        let mut values = require(PlatformKind::Twitter, source)?.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            client_id: next(),
            client_secret: SecretString::from(next()),
            bearer_token: SecretString::from(next()),
            access_token: next(),
            access_token_secret: SecretString::from(next()),
        })
    }
}

/// Instagram Graph API credentials
#[derive(Debug)]
pub struct InstagramCredentials {
    pub access_token: SecretString,
    /// Instagram business/creator account id
    pub account_id: String,
}

impl InstagramCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &impl CredentialSource) -> Result<Self> {
        let mut values = require(PlatformKind::Instagram, source)?.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            access_token: SecretString::from(next()),
            account_id: next(),
        })
    }
}

/// Reddit script-app credentials (password grant)
#[derive(Debug)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
    pub user_agent: String,
}

impl RedditCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &impl CredentialSource) -> Result<Self> {
        let mut values = require(PlatformKind::Reddit, source)?.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            client_id: next(),
            client_secret: SecretString::from(next()),
            username: next(),
            password: SecretString::from(next()),
            user_agent: next(),
        })
    }
}

/// Google OAuth client used for the YouTube consent flow
#[derive(Debug)]
pub struct YouTubeCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl YouTubeCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &impl CredentialSource) -> Result<Self> {
        let mut values = require(PlatformKind::YouTube, source)?.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            client_id: next(),
            client_secret: SecretString::from(next()),
        })
    }
}
