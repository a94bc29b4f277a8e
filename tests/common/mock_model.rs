//! Mock Gemini `generateContent` server.

use base64::Engine;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use super::fixtures::{ISOLATE_PROMPT, STYLIZE_PROMPT, TEST_MODEL};

/// Wrapper around wiremock MockServer answering like the hosted model
pub struct MockModelServer {
    pub server: MockServer,
}

impl MockModelServer {
    /// Start a new mock model server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Base URL to use as the model endpoint
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Path of the generateContent call for the test model
    pub fn generate_path() -> String {
        format!("/v1beta/models/{TEST_MODEL}:generateContent")
    }

    /// Body of a successful response carrying one inline PNG
    pub fn image_response(bytes: &[u8]) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Here you go" },
                        {
                            "inlineData": {
                                "mimeType": "image/png",
                                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                            }
                        }
                    ]
                },
                "finishReason": "STOP"
            }]
        })
    }

    /// Answer the stage whose instruction contains `prompt`
    pub async fn mock_stage(&self, prompt: &str, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(Self::generate_path()))
            .and(body_string_contains(prompt))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Answer the isolate stage with an image
    pub async fn mock_isolate_image(&self, bytes: &[u8]) {
        self.mock_stage(
            ISOLATE_PROMPT,
            ResponseTemplate::new(200).set_body_json(Self::image_response(bytes)),
        )
        .await;
    }

    /// Answer the stylize stage with an image
    pub async fn mock_stylize_image(&self, bytes: &[u8]) {
        self.mock_stage(
            STYLIZE_PROMPT,
            ResponseTemplate::new(200).set_body_json(Self::image_response(bytes)),
        )
        .await;
    }

    /// Answer the isolate stage with an image after a delay
    pub async fn mock_isolate_image_delayed(&self, bytes: &[u8], delay: Duration) {
        self.mock_stage(
            ISOLATE_PROMPT,
            ResponseTemplate::new(200)
                .set_body_json(Self::image_response(bytes))
                .set_delay(delay),
        )
        .await;
    }

    /// Answer a stage with an HTTP error
    pub async fn mock_stage_error(&self, prompt: &str, status: u16, message: &str) {
        self.mock_stage(
            prompt,
            ResponseTemplate::new(status).set_body_json(json!({
                "error": { "code": status, "message": message }
            })),
        )
        .await;
    }

    /// Answer a stage with text only, no image
    pub async fn mock_stage_text_only(&self, prompt: &str) {
        self.mock_stage(
            prompt,
            ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "I cannot do that" }] },
                    "finishReason": "IMAGE_SAFETY"
                }]
            })),
        )
        .await;
    }

    /// Answer a stage with a blocked prompt
    pub async fn mock_stage_blocked(&self, prompt: &str) {
        self.mock_stage(
            prompt,
            ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            })),
        )
        .await;
    }

    /// Only answer when the given API key is sent
    pub async fn mock_isolate_for_key(&self, key: &str, bytes: &[u8]) {
        Mock::given(method("POST"))
            .and(path(Self::generate_path()))
            .and(header("x-goog-api-key", key))
            .and(body_string_contains(ISOLATE_PROMPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(Self::image_response(bytes)))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the model received
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// API keys sent with each request, in order
    pub async fn received_keys(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.headers.get("x-goog-api-key"))
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }
}
