use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ApiKey;

/// Default hosted model endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default image generation model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Default maximum upload body size (10 MiB)
pub const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Default time an unused session is kept (1 hour)
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60;

const DEFAULT_ISOLATE_PROMPT: &str = "You are an AI image processing expert. Identify the primary face in the image, then crop the image to show only the face with a 1:1 aspect ratio. Return only the cropped image without any other modifications.";

const DEFAULT_STYLIZE_PROMPT: &str = "Convert this photo into a pixel art anime-style girl taking a selfie. Use chibi-like proportions with big sparkling eyes, soft rounded facial features, and smooth shoulder-length hair with subtle shading. Outfit should be a cute pajama top with colorful plus-sign patterns. Include a smartphone in her hand as she's taking a selfie. Use soft pastel tones and clean pixelated edges. Background should be minimal or white. Add a small floating heart near the face for a cute effect. Maintain a wholesome and cheerful vibe.";

/// Error loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Application configuration loaded from a YAML file
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Remote model connection
    #[serde(default)]
    pub model: ModelConfig,

    /// Instruction text sent with each stage
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Response safety settings per stage
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Maximum accepted upload body in bytes
    #[serde(default = "default_upload_limit")]
    pub upload_limit_bytes: usize,

    /// Sessions unused for this long are dropped, along with their images
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Server-wide API key used when a session has not supplied its own
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_upload_limit() -> usize {
    DEFAULT_UPLOAD_LIMIT
}

fn default_session_idle_secs() -> u64 {
    DEFAULT_SESSION_IDLE_SECS
}

/// Connection settings for the hosted model
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub name: String,

    /// Transport timeout for one remote call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            name: default_model(),
            timeout_secs: default_timeout(),
        }
    }
}

/// One instruction per pipeline stage
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    #[serde(default = "default_isolate_prompt")]
    pub isolate: String,

    #[serde(default = "default_stylize_prompt")]
    pub stylize: String,
}

fn default_isolate_prompt() -> String {
    DEFAULT_ISOLATE_PROMPT.to_string()
}

fn default_stylize_prompt() -> String {
    DEFAULT_STYLIZE_PROMPT.to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            isolate: default_isolate_prompt(),
            stylize: default_stylize_prompt(),
        }
    }
}

/// A harm category and the threshold at which responses are blocked
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    pub fn new(category: &str, threshold: &str) -> Self {
        Self {
            category: category.to_string(),
            threshold: threshold.to_string(),
        }
    }
}

/// Safety settings attached to each stage's request
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SafetyConfig {
    #[serde(default)]
    pub isolate: Vec<SafetySetting>,

    #[serde(default = "default_stylize_safety")]
    pub stylize: Vec<SafetySetting>,
}

fn default_stylize_safety() -> Vec<SafetySetting> {
    vec![
        SafetySetting::new("HARM_CATEGORY_HATE_SPEECH", "BLOCK_ONLY_HIGH"),
        SafetySetting::new("HARM_CATEGORY_DANGEROUS_CONTENT", "BLOCK_NONE"),
        SafetySetting::new("HARM_CATEGORY_HARASSMENT", "BLOCK_MEDIUM_AND_ABOVE"),
        SafetySetting::new("HARM_CATEGORY_SEXUALLY_EXPLICIT", "BLOCK_LOW_AND_ABOVE"),
    ]
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            isolate: Vec::new(),
            stylize: default_stylize_safety(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from an optional file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config file set, using defaults");
            return Self::default();
        };

        match Self::from_file(path) {
            Ok(config) => {
                tracing::info!(
                    path = %path.display(),
                    model = %config.model.name,
                    "Loaded configuration"
                );
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Apply environment overrides through the given lookup.
    ///
    /// `GEMINI_API_KEY` wins over `GOOGLE_API_KEY`; both win over the file.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("GEMINI_ENDPOINT") {
            self.model.endpoint = endpoint;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.model.name = model;
        }
        self
    }

    /// Server-wide default key, if configured and not blank
    pub fn default_api_key(&self) -> Option<ApiKey> {
        self.api_key.clone().and_then(ApiKey::new)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            prompts: PromptConfig::default(),
            safety: SafetyConfig::default(),
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            api_key: None,
        }
    }
}
