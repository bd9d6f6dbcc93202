//! Core types for Socialdash
//!
//! Records here are transient views of vendor responses. Each one keeps the
//! fields the dashboard reads as typed members and carries every other vendor
//! field in `extra`, so serializing a record gives back the vendor payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The four supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Twitter,
    Instagram,
    Reddit,
    YouTube,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 4] = [
        PlatformKind::Twitter,
        PlatformKind::Instagram,
        PlatformKind::Reddit,
        PlatformKind::YouTube,
    ];

    /// Lowercase identifier used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            PlatformKind::Twitter => "twitter",
            PlatformKind::Instagram => "instagram",
            PlatformKind::Reddit => "reddit",
            PlatformKind::YouTube => "youtube",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformKind::Twitter => "Twitter",
            PlatformKind::Instagram => "Instagram",
            PlatformKind::Reddit => "Reddit",
            PlatformKind::YouTube => "YouTube",
        }
    }

    /// Environment variables that make up the platform's credential bundle
    pub fn required_variables(&self) -> &'static [&'static str] {
        match self {
            PlatformKind::Twitter => &[
                "TWITTER_CLIENT_ID",
                "TWITTER_CLIENT_SECRET",
                "TWITTER_BEARER_TOKEN",
                "TWITTER_ACCESS_TOKEN",
                "TWITTER_ACCESS_TOKEN_SECRET",
            ],
            PlatformKind::Instagram => &["INSTAGRAM_ACCESS_TOKEN", "INSTAGRAM_ACCOUNT_ID"],
            PlatformKind::Reddit => &[
                "REDDIT_CLIENT_ID",
                "REDDIT_CLIENT_SECRET",
                "REDDIT_USERNAME",
                "REDDIT_PASSWORD",
                "REDDIT_USER_AGENT",
            ],
            PlatformKind::YouTube => &["YOUTUBE_CLIENT_ID", "YOUTUBE_CLIENT_SECRET"],
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Who the credentials belong to, as reported by the identity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub platform: PlatformKind,
    pub id: String,
    pub username: Option<String>,
}

// ============================================================================
// Twitter Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_metrics: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tweet {
    pub fn url(&self) -> String {
        tweet_url(&self.id)
    }
}

pub fn tweet_url(id: &str) -> String {
    format!("https://twitter.com/user/status/{}", id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

// ============================================================================
// Instagram Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstagramAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstagramMedia {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstagramMedia {
    /// Image worth showing for this media: the photo itself, or the
    /// thumbnail for videos
    pub fn preview_url(&self) -> Option<&str> {
        match self.media_type.as_deref() {
            Some("IMAGE") | Some("CAROUSEL_ALBUM") => self.media_url.as_deref(),
            Some("VIDEO") => self.thumbnail_url.as_deref(),
            _ => None,
        }
    }
}

/// A page of the Graph API media edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPage {
    #[serde(default)]
    pub data: Vec<InstagramMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Value>,
}

// ============================================================================
// Reddit Types
// ============================================================================

/// What kind of submission to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedditPostKind {
    /// Self post; content is the markdown body
    Text,
    /// Link post; content is the URL
    Link,
    /// Link post whose content is a direct image URL
    Image,
}

impl RedditPostKind {
    /// Value of the `kind` field for `/api/submit`
    pub fn submit_kind(&self) -> &'static str {
        match self {
            RedditPostKind::Text => "self",
            RedditPostKind::Link | RedditPostKind::Image => "link",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RedditPostKind::Text => "text",
            RedditPostKind::Link => "link",
            RedditPostKind::Image => "image",
        }
    }
}

impl std::fmt::Display for RedditPostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RedditPostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(RedditPostKind::Text),
            "link" => Ok(RedditPostKind::Link),
            "image" => Ok(RedditPostKind::Image),
            _ => Err(format!(
                "Invalid post type: '{}'. Valid options: text, link, image",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selftext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_comments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RedditPost {
    pub fn url_on_reddit(&self) -> String {
        reddit_post_url(&self.subreddit, &self.id)
    }
}

pub fn reddit_post_url(subreddit: &str, post_id: &str) -> String {
    format!("https://www.reddit.com/r/{}/comments/{}/", subreddit, post_id)
}

// ============================================================================
// YouTube Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }
}

impl std::str::FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(PrivacyStatus::Public),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "private" => Ok(PrivacyStatus::Private),
            _ => Err(format!(
                "Invalid privacy status: '{}'. Valid options: public, unlisted, private",
                s
            )),
        }
    }
}

/// Metadata for a new upload
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub privacy: PrivacyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A `videos` resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Video {
    pub fn url(&self) -> String {
        video_url(&self.id)
    }
}

pub fn video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Resource id of a search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of listing the authenticated channel's videos
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoList {
    #[serde(default)]
    pub items: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    /// `kind`, `etag`, `pageInfo` and the like
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VideoList {
    /// `(title, video id)` pairs, in listing order, for hits that are videos
    pub fn titles(&self) -> Vec<(String, String)> {
        self.items
            .iter()
            .filter_map(|item| {
                let id = item.id.video_id.clone()?;
                let title = item
                    .snippet
                    .as_ref()
                    .and_then(|s| s.title.clone())
                    .unwrap_or_default();
                Some((title, id))
            })
            .collect()
    }
}
