//! Common test utilities for API testing with a mock transcoder.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by a temporary library database, a temporary cache directory and
//! a MockTranscoder, so delivery can be tested without ffmpeg.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tunecast_core::{
    testing::MockTranscoder, Config, Engine, LibraryConfig, MediaDiscovery, MediaLibrary,
    NewMediaItem, ServerConfig, SqliteLibrary, TranscodeConfig,
};
use tunecast_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use tunecast_core::testing::fixtures;

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_stream() {
///     let fixture = TestFixture::new();
///     let id = fixture.add_item("song.flac", "audio/flac");
///
///     let response = fixture.get_with_headers(&format!("/api/v1/stream/{}", id), &[]).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub engine: Arc<Engine>,
    pub library: Arc<SqliteLibrary>,
    /// Mock transcoder - swap scripts to control job outcomes
    pub transcoder: Arc<MockTranscoder>,
    /// Temporary directory holding the database, cache and music
    pub temp_dir: TempDir,
    pub cache_dir: PathBuf,
    pub music_dir: PathBuf,
}

/// Response from a test request with a JSON body
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from a test request with the raw body
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with a succeeding transcoder.
    pub fn new() -> Self {
        Self::with_transcoder(MockTranscoder::new(), |config| config)
    }

    /// Create a fixture with a custom transcoder and transcode configuration.
    pub fn with_transcoder(
        transcoder: MockTranscoder,
        configure: impl FnOnce(TranscodeConfig) -> TranscodeConfig,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache_dir = temp_dir.path().join("cache");
        let music_dir = temp_dir.path().join("music");
        std::fs::create_dir_all(&music_dir).expect("Failed to create music dir");

        let transcode = configure(fixtures::transcode_config(&cache_dir));
        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            library: LibraryConfig {
                database: temp_dir.path().join("library.db"),
                media_dirs: vec![music_dir.clone()],
                max_depth: 4,
                scan_on_startup: false,
            },
            transcode: transcode.clone(),
        };

        let library = Arc::new(
            SqliteLibrary::new(&config.library.database).expect("Failed to create library"),
        );
        let transcoder = Arc::new(transcoder);
        let engine = Arc::new(
            Engine::start(transcoder.clone(), transcode).expect("Failed to start engine"),
        );
        let discovery = Arc::new(MediaDiscovery::new(
            library.clone() as Arc<dyn MediaLibrary>,
            transcoder.clone(),
        ));

        let state = Arc::new(AppState::new(
            config,
            library.clone(),
            engine.clone(),
            discovery,
        ));
        let router = create_router(state);

        Self {
            router,
            engine,
            library,
            transcoder,
            temp_dir,
            cache_dir,
            music_dir,
        }
    }

    /// Write a source file into the music directory and index it.
    pub fn add_item(&self, file_name: &str, mime_type: &str) -> i64 {
        let path = fixtures::source_file(&self.music_dir, file_name);
        self.library
            .upsert(&NewMediaItem {
                name: file_name.to_string(),
                path,
                mime_type: mime_type.to_string(),
                size_bytes: 18,
                length_secs: Some(337),
                tags: BTreeMap::from([("artist".to_string(), "Miles Davis".to_string())]),
            })
            .expect("Failed to add item")
    }

    /// Poll the engine until no job is running.
    pub async fn wait_until_idle(&self) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.engine.check_background().await.unwrap() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("jobs did not finish in time");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request with extra headers and keep the raw body.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> RawResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

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

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {:?}",
            $status, $response.status, $response.body
        );
    };
}
