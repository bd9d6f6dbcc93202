//! Mock transport implementation for testing
//!
//! Replays a queue of scripted replies in order and records every request it
//! receives. It is available for all builds (not just tests) so integration
//! tests can drive the managers without credentials or network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PlatformError, Result};
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

type Inspector = Box<dyn Fn(&ApiRequest) + Send + Sync>;

/// Scripted transport
///
/// ```
/// use libsocialdash::transport::mock::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.push_json(200, serde_json::json!({"data": {"id": "1", "username": "me"}}));
/// assert_eq!(transport.pending(), 1);
/// ```
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<std::result::Result<ApiResponse, PlatformError>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
    inspector: Option<Inspector>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `inspector` on each request at the moment it is sent
    pub fn with_inspector(
        mut self,
        inspector: impl Fn(&ApiRequest) + Send + Sync + 'static,
    ) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    pub fn push_response(&self, response: ApiResponse) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push_response(ApiResponse::json_body(status, &body))
    }

    /// Queue a transport-level failure (the request never completes)
    pub fn push_error(&self, error: PlatformError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// All requests sent so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests sent with this method to a URL ending in `suffix`
    pub fn requests_to(&self, method: Method, suffix: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// Scripted replies not yet consumed
    pub fn pending(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        if let Some(inspector) = &self.inspector {
            inspector(&request);
        }

        let description = format!("{} {}", request.method.as_str(), request.url);
        self.requests.lock().unwrap().push(request);

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(error.into()),
            None => Err(PlatformError::Network(format!(
                "MockTransport has no scripted reply for {}",
                description
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let transport = MockTransport::new();
        transport
            .push_json(200, serde_json::json!({"n": 1}))
            .push_json(201, serde_json::json!({"n": 2}));

        let first = transport.send(ApiRequest::get("https://a/1")).await.unwrap();
        let second = transport.send(ApiRequest::post("https://a/2")).await.unwrap();

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 201);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.requests_to(Method::Post, "/2").len(), 1);
        assert_eq!(transport.pending(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_network_error() {
        let transport = MockTransport::new();
        let err = transport
            .send(ApiRequest::delete("https://a/thing"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scripted reply for DELETE https://a/thing"));
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let transport = MockTransport::new();
        transport.push_error(PlatformError::Network("connection reset".to_string()));

        let err = transport.send(ApiRequest::get("https://a")).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_inspector_sees_each_request() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let transport = MockTransport::new().with_inspector(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        transport.push_json(200, Value::Null).push_json(200, Value::Null);

        transport.send(ApiRequest::get("https://a")).await.unwrap();
        transport.send(ApiRequest::get("https://b")).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
