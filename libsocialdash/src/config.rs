//! Configuration management for Socialdash
//!
//! Credentials never live here; they come from the environment (see
//! [`crate::credentials`]). This file only carries non-secret settings such
//! as API base URLs and rate-limit wait bounds. Every field has a default, so
//! a missing config file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub rate_limit: RateLimitConfig,
    pub twitter: TwitterConfig,
    pub instagram: InstagramConfig,
    pub reddit: RedditConfig,
    pub youtube: YouTubeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("socialdash/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Longest wait the dashboard accepts before giving up on a rate limit
    pub max_wait_secs: u64,
    /// Wait used when the vendor does not report a reset time
    pub default_wait_secs: u64,
    /// Countdown report interval
    pub tick_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: 15 * 60,
            default_wait_secs: 15 * 60,
            tick_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub api_base: String,
    /// Where the last reported rate-limit window of each endpoint is kept
    /// between runs
    pub quota_file: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            quota_file: "~/.config/socialdash/twitter_quotas.json".to_string(),
        }
    }
}

impl TwitterConfig {
    pub fn quota_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.quota_file).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub graph_base: String,
    /// Pause between publishing and asking for the new post's permalink
    pub permalink_delay_secs: u64,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            graph_base: "https://graph.facebook.com/v18.0".to_string(),
            permalink_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub auth_base: String,
    pub api_base: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            auth_base: "https://www.reddit.com".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_base: String,
    pub upload_base: String,
    pub oauth_base: String,
    /// Where the OAuth token obtained by the consent flow is cached
    pub token_file: String,
    /// Directory for the temporary copy of a video being uploaded
    /// (system temp dir when unset)
    pub staging_dir: Option<String>,
    /// Category assigned to new uploads ("22" is People & Blogs)
    pub category_id: String,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            oauth_base: "https://oauth2.googleapis.com".to_string(),
            token_file: "~/.config/socialdash/youtube_token.json".to_string(),
            staging_dir: None,
            category_id: "22".to_string(),
        }
    }
}

impl YouTubeConfig {
    pub fn token_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.token_file).to_string())
    }

    pub fn staging_path(&self) -> PathBuf {
        match &self.staging_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => std::env::temp_dir(),
        }
    }
}

impl RateLimitConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_secs(self.default_wait_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists there
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// `$SOCIALDASH_CONFIG` if set, else `socialdash/config.toml` under the user config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SOCIALDASH_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("socialdash").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.twitter.api_base, "https://api.twitter.com");
        assert_eq!(config.instagram.permalink_delay_secs, 5);
        assert_eq!(config.reddit.api_base, "https://oauth.reddit.com");
        assert_eq!(config.youtube.category_id, "22");
        assert_eq!(config.rate_limit.max_wait(), Duration::from_secs(900));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[twitter]
quota_file = "/var/lib/socialdash/quotas.json"

[instagram]
permalink_delay_secs = 0

[youtube]
staging_dir = "/tmp/socialdash-staging"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.instagram.permalink_delay_secs, 0);
        assert_eq!(
            config.twitter.quota_path(),
            PathBuf::from("/var/lib/socialdash/quotas.json")
        );
        assert_eq!(config.twitter.api_base, "https://api.twitter.com");
        assert_eq!(config.instagram.graph_base, "https://graph.facebook.com/v18.0");
        assert_eq!(
            config.youtube.staging_path(),
            PathBuf::from("/tmp/socialdash-staging")
        );
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[twitter\napi_base = 1").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_tick_never_zero() {
        let config = RateLimitConfig {
            tick_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.tick(), Duration::from_secs(1));
    }
}
