//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use pixelme::models::AppConfig;
use pixelme::server::{build_router, create_app_state, AppState};
use pixelme::services::{InMemorySessionRegistry, SessionRegistry};

use super::fixtures::config_for;
use super::mock_model::MockModelServer;

/// Test application with router and direct access to services
pub struct TestApp {
    router: axum::Router,
    pub sessions: Arc<InMemorySessionRegistry>,
}

impl TestApp {
    /// Create a test application from a configuration, using embedded UI assets
    pub fn new(config: AppConfig) -> Self {
        let state = create_app_state(config, None).expect("Failed to create app state");

        // Keep references for test assertions
        let sessions = state.sessions.clone();

        // Build router using shared server module (same as production)
        let router = build_router(state);

        Self { router, sessions }
    }

    /// Create a test application talking to a mock model server
    pub fn with_model(model: &MockModelServer, server_key: Option<&str>) -> Self {
        Self::new(config_for(&model.url(), server_key))
    }

    /// Create a test app and return the state for custom router configuration
    pub fn create_state(config: AppConfig) -> AppState {
        create_app_state(config, None).expect("Failed to create app state")
    }

    /// Make a GET request to the given path
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::get(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> TestResponse {
        let mut builder = Request::post(path).header("Content-Type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Make a POST request without a body
    pub async fn post_empty(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::post(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::delete(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Send a request to the router
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Submit a photo for a session and return the response
    pub async fn submit(&self, session: &str, image: &str) -> TestResponse {
        self.post_json(
            "/api/run",
            &[("Session-Id", session)],
            &super::fixtures::submit_body(image),
        )
        .await
    }

    /// Poll the run until it stops processing, returning the final snapshot
    pub async fn wait_for_run(&self, session: &str) -> serde_json::Value {
        for _ in 0..300 {
            let response = self
                .get_with_headers("/api/run", &[("Session-Id", session)])
                .await;
            assert_eq!(response.status, StatusCode::OK);
            let json: serde_json::Value = response.json();
            if json["status"] != "processing" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Run for session {session} never finished");
    }

    /// Number of sessions the server has seen
    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }
}

/// Test response with convenience methods
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// Get body as string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Get raw body bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Check if response is a PNG image
    pub fn is_png(&self) -> bool {
        self.body.len() >= 8 && &self.body[0..8] == b"\x89PNG\r\n\x1a\n"
    }
}
