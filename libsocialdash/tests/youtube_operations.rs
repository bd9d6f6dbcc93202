//! YouTubeOperations behavior against a scripted transport
//!
//! Covers:
//! - Token reuse, refresh and the authentication gate
//! - Upload staging: exactly one temporary file, always cleaned up
//! - Listing, reading, updating and deleting videos

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use libsocialdash::config::YouTubeConfig;
use libsocialdash::credentials::YouTubeCredentials;
use libsocialdash::platforms::google_oauth::{StoredToken, TokenCache};
use libsocialdash::platforms::youtube::YouTubeOperations;
use libsocialdash::platforms::Platform;
use libsocialdash::transport::mock::MockTransport;
use libsocialdash::transport::{ApiResponse, Body, Method};
use libsocialdash::types::{PrivacyStatus, VideoMetadata};
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    config: YouTubeConfig,
    staging: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let config = YouTubeConfig {
            token_file: dir.path().join("token.json").to_string_lossy().to_string(),
            staging_dir: Some(staging.to_string_lossy().to_string()),
            ..YouTubeConfig::default()
        };
        Self {
            _dir: dir,
            config,
            staging,
        }
    }

    fn cache(&self) -> TokenCache {
        TokenCache::new(self.config.token_path())
    }

    fn cache_token(&self, expires_at: i64) {
        self.cache()
            .save(&StoredToken {
                access_token: "ya29.cached".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                expires_at,
                scope: None,
            })
            .unwrap();
    }

    fn operations(&self, transport: &Arc<MockTransport>) -> YouTubeOperations {
        let vars: HashMap<String, String> = [
            ("YOUTUBE_CLIENT_ID", "1234.apps.googleusercontent.com"),
            ("YOUTUBE_CLIENT_SECRET", "GOCSPX-secret"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let creds = YouTubeCredentials::from_source(&vars).unwrap();
        YouTubeOperations::new(creds, &self.config, transport.clone())
    }

    fn staged_files(&self) -> usize {
        count_files(&self.staging)
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 3600
}

fn channel() -> serde_json::Value {
    json!({"items": [{"id": "UC_x5XG1OV2P6uZZ5FSM9Ttw", "snippet": {"title": "Dash Channel"}}]})
}

fn metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Launch day".to_string(),
        description: "Behind the scenes".to_string(),
        privacy: PrivacyStatus::Unlisted,
    }
}

/// Operations authenticated with a valid cached token
async fn authenticated(fixture: &Fixture, transport: &Arc<MockTransport>) -> YouTubeOperations {
    fixture.cache_token(far_future());
    transport.push_json(200, channel());
    let mut youtube = fixture.operations(transport);
    youtube
        .authenticate(|_| panic!("device flow should not run"))
        .await
        .unwrap();
    youtube
}

/// Transport that records how many files sit in `staging` whenever the
/// video bytes are sent
fn watching_transport(staging: PathBuf) -> (Arc<MockTransport>, Arc<Mutex<Vec<usize>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let transport = MockTransport::new().with_inspector(move |request| {
        if request.method == Method::Put {
            record.lock().unwrap().push(count_files(&staging));
        }
    });
    (Arc::new(transport), seen)
}

#[tokio::test]
async fn test_operations_refuse_before_authentication() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = fixture.operations(&transport);

    assert!(!youtube.is_authenticated());
    let err = youtube.list_my_videos(5).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("Not authenticated"));

    let upload = youtube
        .create_video_from_reader(&metadata(), &b"bytes"[..], "mp4")
        .await
        .unwrap_err();
    assert_eq!(upload.exit_code(), 2);

    assert_eq!(transport.request_count(), 0);
    assert_eq!(fixture.staged_files(), 0);
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = authenticated(&fixture, &transport).await;

    assert!(youtube.is_authenticated());
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("/channels"));
    assert_eq!(requests[0].query_value("mine"), Some("true"));
    assert_eq!(requests[0].header_value("authorization"), Some("Bearer ya29.cached"));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_saved() {
    let fixture = Fixture::new();
    fixture.cache_token(0);
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(200, json!({"access_token": "ya29.refreshed", "expires_in": 3599}))
        .push_json(200, channel());

    let mut youtube = fixture.operations(&transport);
    let identity = youtube
        .authenticate(|_| panic!("device flow should not run"))
        .await
        .unwrap();

    assert_eq!(identity.username.as_deref(), Some("Dash Channel"));
    let saved = fixture.cache().load().unwrap();
    assert_eq!(saved.access_token, "ya29.refreshed");
    assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
}

#[tokio::test]
async fn test_first_login_runs_device_flow() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(
            200,
            json!({
                "device_code": "AH-1Ng3",
                "user_code": "GQVQ-JKEC",
                "verification_url": "https://www.google.com/device",
                "expires_in": 1800,
                "interval": 0
            }),
        )
        .push_json(
            200,
            json!({"access_token": "ya29.new", "expires_in": 3599, "refresh_token": "1//new"}),
        )
        .push_json(200, channel());

    let mut prompted = Vec::new();
    let mut youtube = fixture.operations(&transport);
    youtube
        .authenticate(|code| prompted.push(code.user_code.clone()))
        .await
        .unwrap();

    assert_eq!(prompted, vec!["GQVQ-JKEC".to_string()]);
    assert_eq!(fixture.cache().load().unwrap().access_token, "ya29.new");
}

#[tokio::test]
async fn test_upload_stages_exactly_one_file_and_cleans_up() {
    let fixture = Fixture::new();
    let (transport, seen) = watching_transport(fixture.staging.clone());
    let youtube = authenticated(&fixture, &transport).await;

    transport
        .push_response(
            ApiResponse::new(200, "")
                .with_header(
                    "Location",
                    "https://www.googleapis.com/upload/youtube/v3/videos?upload_id=xa298sd",
                ),
        )
        .push_json(
            200,
            json!({"id": "Ks-_Mh1QhMc", "snippet": {"title": "Launch day", "description": "Behind the scenes"}}),
        );

    let video = youtube
        .create_video_from_reader(&metadata(), &b"\x00\x00\x00\x18ftypmp42"[..], "mp4")
        .await
        .unwrap();

    assert_eq!(video.id, "Ks-_Mh1QhMc");
    assert_eq!(video.url(), "https://www.youtube.com/watch?v=Ks-_Mh1QhMc");
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(fixture.staged_files(), 0);

    let session = &transport.requests_to(Method::Post, "/videos")[0];
    assert_eq!(session.query_value("uploadType"), Some("resumable"));
    assert_eq!(session.header_value("x-upload-content-type"), Some("video/mp4"));
    match &session.body {
        Body::Json(body) => {
            assert_eq!(body["snippet"]["title"], "Launch day");
            assert_eq!(body["snippet"]["categoryId"], "22");
            assert_eq!(body["status"]["privacyStatus"], "unlisted");
        }
        other => panic!("Expected JSON metadata, got {:?}", other),
    }

    let puts = transport.requests_to(Method::Put, "upload_id=xa298sd");
    assert_eq!(puts.len(), 1);
    assert_eq!(
        puts[0].body,
        Body::Bytes {
            content_type: "video/mp4".to_string(),
            data: b"\x00\x00\x00\x18ftypmp42".to_vec(),
        }
    );
}

#[tokio::test]
async fn test_failed_upload_still_removes_staged_file() {
    let fixture = Fixture::new();
    let (transport, seen) = watching_transport(fixture.staging.clone());
    let youtube = authenticated(&fixture, &transport).await;

    transport
        .push_response(
            ApiResponse::new(200, "").with_header("location", "https://upload.test/session"),
        )
        .push_json(503, json!({"error": {"code": 503, "message": "Backend Error"}}));

    let err = youtube
        .create_video_from_reader(&metadata(), &b"video"[..], "mov")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Backend Error"));
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(fixture.staged_files(), 0);
}

#[tokio::test]
async fn test_quota_error_before_upload_removes_staged_file() {
    let fixture = Fixture::new();
    let (transport, seen) = watching_transport(fixture.staging.clone());
    let youtube = authenticated(&fixture, &transport).await;

    transport.push_json(
        403,
        json!({"error": {"code": 403, "message": "quota", "errors": [{"reason": "quotaExceeded"}]}}),
    );

    let err = youtube
        .create_video_from_reader(&metadata(), &b"video"[..], "mp4")
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 4);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(fixture.staged_files(), 0);
}

#[tokio::test]
async fn test_list_my_videos() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = authenticated(&fixture, &transport).await;
    transport.push_json(
        200,
        json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "a1"}, "snippet": {"title": "First"}},
                {"id": {"kind": "youtube#video", "videoId": "b2"}, "snippet": {"title": "Second"}}
            ],
            "nextPageToken": "CAUQAA"
        }),
    );

    let list = youtube.list_my_videos(5).await.unwrap();

    assert_eq!(
        list.titles(),
        vec![
            ("First".to_string(), "a1".to_string()),
            ("Second".to_string(), "b2".to_string())
        ]
    );
    assert_eq!(list.next_page_token.as_deref(), Some("CAUQAA"));

    let request = transport.requests().pop().unwrap();
    assert!(request.url.ends_with("/search"));
    assert_eq!(request.query_value("forMine"), Some("true"));
    assert_eq!(request.query_value("type"), Some("video"));
    assert_eq!(request.query_value("maxResults"), Some("5"));
}

#[tokio::test]
async fn test_read_video() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = authenticated(&fixture, &transport).await;
    transport
        .push_json(
            200,
            json!({"items": [{
                "id": "a1",
                "snippet": {"title": "First", "description": "d", "publishedAt": "2024-10-01T00:00:00Z"},
                "statistics": {"viewCount": "12"},
                "status": {"privacyStatus": "public"}
            }]}),
        )
        .push_json(200, json!({"items": []}));

    let video = youtube.read_video("a1").await.unwrap().unwrap();
    let snippet = video.snippet.as_ref().unwrap();
    assert_eq!(snippet.published_at.as_deref(), Some("2024-10-01T00:00:00Z"));
    assert_eq!(video.statistics.as_ref().unwrap()["viewCount"], "12");

    assert!(youtube.read_video("gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_preserves_category_and_tags() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = authenticated(&fixture, &transport).await;
    transport
        .push_json(
            200,
            json!({"items": [{
                "id": "a1",
                "snippet": {
                    "title": "Old",
                    "description": "Old description",
                    "categoryId": "28",
                    "tags": ["rust", "demo"],
                    "channelTitle": "Dash Channel"
                }
            }]}),
        )
        .push_json(
            200,
            json!({"id": "a1", "snippet": {"title": "New", "description": "New description", "categoryId": "28"}}),
        );

    let video = youtube
        .update_video("a1", "New", "New description")
        .await
        .unwrap();
    assert_eq!(video.snippet.unwrap().title.as_deref(), Some("New"));

    let update = &transport.requests_to(Method::Put, "/videos")[0];
    assert_eq!(update.query_value("part"), Some("snippet"));
    match &update.body {
        Body::Json(body) => {
            assert_eq!(body["id"], "a1");
            assert_eq!(body["snippet"]["title"], "New");
            assert_eq!(body["snippet"]["categoryId"], "28");
            assert_eq!(body["snippet"]["tags"], json!(["rust", "demo"]));
            assert!(body["snippet"].get("channelTitle").is_none());
        }
        other => panic!("Expected JSON body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_missing_video_is_not_found() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = authenticated(&fixture, &transport).await;
    transport.push_json(200, json!({"items": []}));

    let err = youtube.update_video("gone", "t", "d").await.unwrap_err();
    assert!(err.to_string().contains("Not found"));
}

#[tokio::test]
async fn test_delete_video() {
    let fixture = Fixture::new();
    let transport = Arc::new(MockTransport::new());
    let youtube = authenticated(&fixture, &transport).await;
    transport
        .push_response(ApiResponse::new(204, ""))
        .push_json(
            404,
            json!({"error": {"code": 404, "message": "Video not found", "errors": [{"reason": "videoNotFound"}]}}),
        );

    assert!(youtube.delete_video("a1").await.unwrap());
    let err = youtube.delete_video("gone").await.unwrap_err();
    assert!(err.to_string().contains("Video not found"));

    let delete = &transport.requests_to(Method::Delete, "/videos")[0];
    assert_eq!(delete.query_value("id"), Some("a1"));
}
