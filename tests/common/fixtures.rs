//! Test fixtures and constants.

use pixelme::models::{AppConfig, DataUri};

/// Model name the mock server answers for
pub const TEST_MODEL: &str = "test-model";

/// Server-wide API key used by most tests
pub const SERVER_KEY: &str = "server-key-1234";

/// Marker text sent with the isolate stage
pub const ISOLATE_PROMPT: &str = "ISOLATE-THE-FACE";

/// Marker text sent with the stylize stage
pub const STYLIZE_PROMPT: &str = "MAKE-IT-PIXEL-ART";

/// Session IDs for different scenarios
pub mod sessions {
    pub const ALICE: &str = "tab-alice";
    pub const BOB: &str = "tab-bob";
}

/// Bytes standing in for the uploaded selfie
pub const SELFIE_BYTES: &[u8] = b"\xff\xd8\xff\xe0selfie";

/// Bytes the mock model returns for the isolate stage
pub const ISOLATED_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nisolated";

/// Bytes the mock model returns for the stylize stage
pub const PORTRAIT_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nportrait";

/// Uploaded selfie as a data URI string
pub fn selfie_data_uri() -> String {
    DataUri::from_bytes("image/jpeg", SELFIE_BYTES).to_string()
}

/// JSON body for POST /api/run
pub fn submit_body(image: &str) -> String {
    serde_json::json!({ "image": image }).to_string()
}

/// Configuration pointing at a mock model server
pub fn config_for(endpoint: &str, server_key: Option<&str>) -> AppConfig {
    let mut config = AppConfig::default();
    config.model.endpoint = endpoint.to_string();
    config.model.name = TEST_MODEL.to_string();
    config.model.timeout_secs = 5;
    config.prompts.isolate = ISOLATE_PROMPT.to_string();
    config.prompts.stylize = STYLIZE_PROMPT.to_string();
    config.api_key = server_key.map(str::to_string);
    config
}
