//! InstagramApi behavior against a scripted transport

use std::collections::HashMap;
use std::sync::Arc;

use libsocialdash::config::InstagramConfig;
use libsocialdash::credentials::InstagramCredentials;
use libsocialdash::error::{ConfigError, DashError, PlatformError};
use libsocialdash::platforms::instagram::{InstagramApi, MEDIA_FIELDS};
use libsocialdash::platforms::Platform;
use libsocialdash::transport::mock::MockTransport;
use libsocialdash::transport::Method;
use serde_json::json;

const ACCOUNT: &str = "17841400008460056";

fn credentials() -> HashMap<String, String> {
    [
        ("INSTAGRAM_ACCESS_TOKEN", "EAAGm0PX4ZCpsBA"),
        ("INSTAGRAM_ACCOUNT_ID", ACCOUNT),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

async fn connected(transport: &Arc<MockTransport>) -> InstagramApi {
    transport.push_json(200, json!({"id": ACCOUNT, "username": "socialdash.demo"}));
    let creds = InstagramCredentials::from_source(&credentials()).unwrap();
    InstagramApi::connect(creds, &InstagramConfig::default(), transport.clone())
        .await
        .unwrap()
}

#[test]
fn test_missing_account_id() {
    let mut vars = credentials();
    vars.remove("INSTAGRAM_ACCOUNT_ID");

    match InstagramCredentials::from_source(&vars) {
        Err(DashError::Config(ConfigError::MissingCredentials { platform, missing })) => {
            assert_eq!(platform, "Instagram");
            assert_eq!(missing, vec!["INSTAGRAM_ACCOUNT_ID".to_string()]);
        }
        other => panic!("Expected missing credentials, got {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_token_fails_construction() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(
        400,
        json!({"error": {
            "message": "Error validating access token: Session has expired.",
            "type": "OAuthException",
            "code": 190,
            "error_subcode": 463
        }}),
    );

    let creds = InstagramCredentials::from_source(&credentials()).unwrap();
    let result = InstagramApi::connect(creds, &InstagramConfig::default(), transport.clone()).await;

    match result {
        Err(DashError::Platform(PlatformError::Authentication(msg))) => {
            assert!(msg.contains("Session has expired"));
        }
        Err(other) => panic!("Expected authentication error, got {:?}", other),
        Ok(_) => panic!("Expected authentication error"),
    }
}

#[tokio::test]
async fn test_construction_checks_account() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;

    let check = &transport.requests()[0];
    assert!(check.url.ends_with(&format!("/v18.0/{}", ACCOUNT)));
    assert_eq!(check.query_value("fields"), Some("id,username"));
    assert_eq!(check.query_value("access_token"), Some("EAAGm0PX4ZCpsBA"));

    assert!(instagram.is_authenticated());
    assert_eq!(instagram.account().username.as_deref(), Some("socialdash.demo"));
}

#[tokio::test]
async fn test_publish_creates_container_then_publishes() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    transport
        .push_json(200, json!({"id": "17889455560051444"}))
        .push_json(200, json!({"id": "17895695668004550"}));

    let media_id = instagram
        .create_post("https://example.com/sunset.jpg", "Golden hour #nofilter")
        .await
        .unwrap();

    assert_eq!(media_id, "17895695668004550");

    let container = &transport.requests_to(Method::Post, &format!("{}/media", ACCOUNT))[0];
    assert_eq!(container.form_value("image_url"), Some("https://example.com/sunset.jpg"));
    assert_eq!(container.form_value("caption"), Some("Golden hour #nofilter"));
    assert_eq!(container.form_value("access_token"), Some("EAAGm0PX4ZCpsBA"));

    let publish = &transport.requests_to(Method::Post, "/media_publish")[0];
    assert_eq!(publish.form_value("creation_id"), Some("17889455560051444"));
}

#[tokio::test]
async fn test_publish_failure_after_container_propagates() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    transport
        .push_json(200, json!({"id": "17889455560051444"}))
        .push_json(
            400,
            json!({"error": {"message": "The media is not ready for publishing, please wait for a moment", "code": 9007}}),
        );

    let err = instagram
        .create_post("https://example.com/sunset.jpg", "")
        .await
        .unwrap_err();

    assert!(matches!(err, DashError::Platform(PlatformError::Validation(_))));
    assert!(err.to_string().contains("not ready for publishing"));
}

#[tokio::test]
async fn test_publish_rejects_non_url_before_calling() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    let calls_before = transport.request_count();

    let err = instagram.create_post("sunset.jpg", "caption").await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(transport.request_count(), calls_before);
}

#[tokio::test]
async fn test_throttled_publish_is_rate_limit() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    transport.push_json(
        400,
        json!({"error": {"message": "Application request limit reached", "code": 4}}),
    );

    let err = instagram
        .create_post("https://example.com/a.jpg", "")
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_media_list() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    transport.push_json(
        200,
        json!({
            "data": [
                {
                    "id": "17895695668004550",
                    "caption": "Golden hour",
                    "media_type": "IMAGE",
                    "media_url": "https://scontent.cdninstagram.com/a.jpg",
                    "permalink": "https://www.instagram.com/p/CxYz/",
                    "timestamp": "2024-10-01T18:00:00+0000"
                },
                {
                    "id": "17895695668004551",
                    "media_type": "VIDEO",
                    "media_url": "https://scontent.cdninstagram.com/b.mp4",
                    "thumbnail_url": "https://scontent.cdninstagram.com/b.jpg",
                    "permalink": "https://www.instagram.com/p/CxYy/"
                }
            ],
            "paging": {"cursors": {"before": "QVFI", "after": "QVFJ"}}
        }),
    );

    let page = instagram.get_media_list(5).await.unwrap();

    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].caption.as_deref(), Some("Golden hour"));
    assert_eq!(page.data[1].caption, None);
    assert_eq!(
        page.data[1].preview_url(),
        Some("https://scontent.cdninstagram.com/b.jpg")
    );

    let request = transport.requests().pop().unwrap();
    assert!(request.url.ends_with(&format!("{}/media", ACCOUNT)));
    assert_eq!(request.query_value("limit"), Some("5"));
    assert_eq!(request.query_value("fields"), Some(MEDIA_FIELDS.join(",").as_str()));
}

#[tokio::test]
async fn test_get_media_permalink() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    transport.push_json(
        200,
        json!({"permalink": "https://www.instagram.com/p/CxYz/", "id": "17895695668004550"}),
    );

    let media = instagram
        .get_media("17895695668004550", &["permalink"])
        .await
        .unwrap();

    assert_eq!(media.permalink.as_deref(), Some("https://www.instagram.com/p/CxYz/"));
    let request = transport.requests().pop().unwrap();
    assert!(request.url.ends_with("/17895695668004550"));
    assert_eq!(request.query_value("fields"), Some("permalink"));
}

#[tokio::test]
async fn test_account_info_keeps_extra_fields() {
    let transport = Arc::new(MockTransport::new());
    let instagram = connected(&transport).await;
    transport.push_json(
        200,
        json!({
            "id": ACCOUNT,
            "username": "socialdash.demo",
            "followers_count": 1204,
            "media_count": 87,
            "profile_picture_url": "https://scontent.cdninstagram.com/p.jpg"
        }),
    );

    let account = instagram.get_account_info().await.unwrap();
    assert_eq!(account.extra["followers_count"], 1204);
    assert_eq!(
        account.profile_picture_url.as_deref(),
        Some("https://scontent.cdninstagram.com/p.jpg")
    );
}
