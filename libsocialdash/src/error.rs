//! Error types for Socialdash

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashError>;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashError {
    /// Process exit code for this error category
    pub fn exit_code(&self) -> i32 {
        match self {
            DashError::InvalidInput(_) => 3,
            DashError::Platform(PlatformError::Authentication(_)) => 2,
            DashError::Config(ConfigError::MissingCredentials { .. }) => 2,
            DashError::Platform(PlatformError::RateLimit { .. }) => 4,
            DashError::Platform(_) => 1,
            DashError::Config(_) => 1,
            DashError::Io(_) => 1,
        }
    }

    /// Vendor reset time if this error is a rate-limit rejection
    pub fn rate_limit_reset(&self) -> Option<Option<i64>> {
        match self {
            DashError::Platform(PlatformError::RateLimit { reset_at, .. }) => Some(*reset_at),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required {platform} API credentials: {}", .missing.join(", "))]
    MissingCredentials {
        platform: String,
        missing: Vec<String>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request validation failed: {0}")]
    Validation(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        /// Unix timestamp at which the vendor window resets, when reported
        reset_at: Option<i64>,
    },
}

impl PlatformError {
    pub fn rate_limit(message: impl Into<String>, reset_at: Option<i64>) -> Self {
        PlatformError::RateLimit {
            message: message.into(),
            reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(platform: &str, vars: &[&str]) -> ConfigError {
        ConfigError::MissingCredentials {
            platform: platform.to_string(),
            missing: vars.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_exit_codes_by_category() {
        let cases: Vec<(DashError, i32)> = vec![
            (DashError::InvalidInput("Empty tweet text".to_string()), 3),
            (PlatformError::Authentication("bad token".to_string()).into(), 2),
            (missing("Twitter", &["TWITTER_BEARER_TOKEN"]).into(), 2),
            (PlatformError::rate_limit("429", Some(1_700_000_000)).into(), 4),
            (PlatformError::Api("500".to_string()).into(), 1),
            (PlatformError::Network("refused".to_string()).into(), 1),
            (ConfigError::MissingField("youtube.token_file".to_string()).into(), 1),
        ];

        for (error, code) in cases {
            assert_eq!(error.exit_code(), code, "{}", error);
        }
    }

    #[test]
    fn test_missing_credentials_message_lists_variables() {
        let error = missing("Reddit", &["REDDIT_USERNAME", "REDDIT_PASSWORD"]);
        assert_eq!(
            error.to_string(),
            "Missing required Reddit API credentials: REDDIT_USERNAME, REDDIT_PASSWORD"
        );
    }

    #[test]
    fn test_platform_errors_are_wrapped_with_context() {
        let error: DashError = PlatformError::Validation("title is required".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Platform error: Request validation failed: title is required"
        );
    }

    #[test]
    fn test_rate_limit_reset_accessor() {
        let limited: DashError = PlatformError::rate_limit("slow down", Some(42)).into();
        assert_eq!(limited.rate_limit_reset(), Some(Some(42)));

        let unknown_reset: DashError = PlatformError::rate_limit("slow down", None).into();
        assert_eq!(unknown_reset.rate_limit_reset(), Some(None));

        let other: DashError = PlatformError::Api("boom".to_string()).into();
        assert_eq!(other.rate_limit_reset(), None);
    }
}
