//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock transfer engine and a scripted search provider, enabling
//! end-to-end testing without a swarm or an indexer.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use seedstream_core::{
    testing::{MockEngine, MockProvider},
    Config, RankContext, ResourceManager, ResumeStore, SearchAggregator, SearchProvider,
    StreamService, StreamSynthesizer, TransferEngine,
};
use seedstream_server::state::AppState;

/// Re-export fixtures for test convenience
pub use seedstream_core::testing::fixtures;

/// Base URL every playback URL in tests starts with.
pub const PUBLIC_URL: &str = "http://media.test";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_addon_streams() {
///     let fixture = TestFixture::new().await;
///     fixture.provider.set_results(vec![/* candidates */]).await;
///
///     let response = fixture.get("/addon/stream/movie/tt0111161.json").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - register resources and control fetches
    pub engine: Arc<MockEngine>,
    /// Mock provider - configure search results
    pub provider: Arc<MockProvider>,
    /// Shared with the router
    pub manager: ResourceManager,
    /// Temporary directory for resume records
    pub temp_dir: TempDir,
}

/// Response from a test request with a JSON body
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from a test request, body kept as bytes
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let engine = Arc::new(MockEngine::new());
        let provider = Arc::new(MockProvider::new("mock"));

        let mut config = Config::default();
        config.server.public_url = Some(PUBLIC_URL.to_string());
        config.resources.torrent_dir = temp_dir.path().join("torrents");

        let store = ResumeStore::open(&config.resources.torrent_dir)
            .await
            .expect("Failed to open resume store");
        let manager = ResourceManager::with_timings(
            Arc::clone(&engine) as Arc<dyn TransferEngine>,
            store,
            Duration::from_secs(48 * 3600),
            Duration::from_secs(2),
            Duration::from_secs(3600),
        );

        let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::clone(&provider) as _];
        let aggregator = Arc::new(SearchAggregator::new(providers, 2, Duration::from_secs(2)));
        let streams = Arc::new(StreamService::new(
            aggregator,
            StreamSynthesizer::new(manager.clone(), &config.ranking),
            RankContext::from_config(&config.ranking),
        ));

        let state = Arc::new(AppState::new(config, manager.clone(), streams));
        let router = seedstream_server::api::create_router(state);

        Self {
            router,
            engine,
            provider,
            manager,
            temp_dir,
        }
    }

    /// Send a GET request and parse the body as JSON.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a GET request and hand back the response with its body unread,
    /// as a client that has not consumed the stream yet.
    pub async fn open(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a GET request with extra headers, keeping the raw body.
    pub async fn get_raw(&self, path: &str, headers: &[(&str, &str)]) -> RawResponse {
        let response = self.open(path, headers).await;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Path of the playback endpoint for `uri` and `file_path`.
pub fn stream_path(uri: &str, file_path: &str) -> String {
    format!(
        "/stream/{}/{}",
        urlencoding::encode(uri),
        urlencoding::encode(file_path)
    )
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
