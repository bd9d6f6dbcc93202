//! Platform managers
//!
//! One manager per vendor API. Managers are independent: each is built from
//! its own credential bundle, verifies the credentials before it hands out
//! any operation, and exposes one method per operation. They share nothing
//! except the [`Transport`](crate::transport::Transport) seam and the error
//! taxonomy.
//!
//! # Examples
//!
//! ```no_run
//! use libsocialdash::platforms::{Platform, twitter::TwitterManager};
//! use libsocialdash::Config;
//!
//! # async fn example() -> libsocialdash::Result<()> {
//! let config = Config::load()?;
//! let twitter = TwitterManager::from_env(&config).await?;
//!
//! let me = twitter.verify().await?;
//! println!("Signed in to {} as {:?}", twitter.name(), me.username);
//!
//! if let Some(tweet) = twitter.create_tweet("Hello from socialdash").await? {
//!     println!("{}", tweet.url());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Identity, PlatformKind};

pub mod google_oauth;
pub mod instagram;
pub mod oauth1;
pub mod reddit;
pub mod twitter;
pub mod youtube;

/// What every manager has in common
#[async_trait]
pub trait Platform: Send + Sync {
    fn kind(&self) -> PlatformKind;

    /// Lowercase platform identifier (e.g., "twitter", "reddit")
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Whether the credentials have been verified against the vendor
    ///
    /// Operations refuse to run until this is true.
    fn is_authenticated(&self) -> bool;

    /// Ask the vendor who these credentials belong to
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the vendor rejects the
    /// credentials.
    async fn verify(&self) -> Result<Identity>;
}

/// Current Unix time in seconds
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Pull a human-readable message out of a vendor error body, falling back to
/// the raw text
pub(crate) fn vendor_message(body: &serde_json::Value, raw: &str) -> String {
    let candidates = [
        body.pointer("/error/message"),
        body.pointer("/detail"),
        body.pointer("/title"),
        body.pointer("/errors/0/message"),
        body.pointer("/message"),
        body.pointer("/error_description"),
        body.pointer("/error"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| crate::transport::truncate(raw.trim(), 200))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vendor_message_prefers_structured_fields() {
        let graph = json!({"error": {"message": "Invalid OAuth access token.", "code": 190}});
        assert_eq!(vendor_message(&graph, ""), "Invalid OAuth access token.");

        let twitter = json!({"title": "Unauthorized", "detail": "Unauthorized", "status": 401});
        assert_eq!(vendor_message(&twitter, ""), "Unauthorized");

        let reddit = json!({"message": "Forbidden", "error": 403});
        assert_eq!(vendor_message(&reddit, ""), "Forbidden");

        let oauth = json!({"error": "invalid_grant"});
        assert_eq!(vendor_message(&oauth, ""), "invalid_grant");
    }

    #[test]
    fn test_vendor_message_falls_back_to_raw() {
        assert_eq!(
            vendor_message(&serde_json::Value::Null, "  Bad Gateway \n"),
            "Bad Gateway"
        );
    }
}
