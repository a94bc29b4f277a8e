//! Assertion helpers for tests.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use super::app::TestResponse;

/// Assert response has expected status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status, expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        response.status,
        response.text()
    );
}

/// Assert response is OK (200)
pub fn assert_ok(response: &TestResponse) {
    assert_status(response, StatusCode::OK);
}

/// Assert response is a valid PNG image
pub fn assert_png(response: &TestResponse) {
    assert_ok(response);
    assert!(
        response.is_png(),
        "Expected PNG image, got {} bytes starting with {:?}",
        response.body.len(),
        &response.body[..8.min(response.body.len())]
    );
    assert_eq!(
        response.header("content-type"),
        Some("image/png"),
        "Expected Content-Type: image/png"
    );
}

/// Assert an error response with the JSON error envelope
pub fn assert_api_error(response: &TestResponse, expected: StatusCode) -> String {
    assert_status(response, expected);
    let json: serde_json::Value = response.json();
    assert_eq!(
        json["status"].as_u64(),
        Some(expected.as_u16() as u64),
        "Expected JSON status {}, got {:?}. Full response: {}",
        expected.as_u16(),
        json["status"],
        serde_json::to_string_pretty(&json).unwrap()
    );
    json["error"]
        .as_str()
        .expect("Expected error message")
        .to_string()
}

/// Assert a run snapshot is idle with nothing in it
pub fn assert_empty_run(json: &serde_json::Value) {
    assert_eq!(json["stage"], "idle");
    assert_eq!(json["status"], "empty");
    assert_eq!(json["progress"], 0);
    assert_eq!(json["has_source"], false);
    assert_eq!(json["has_isolated"], false);
    assert_eq!(json["has_final"], false);
    assert!(json["error"].is_null(), "Expected no error: {json}");
    assert!(json["final_image"].is_null(), "Expected no final image: {json}");
}
