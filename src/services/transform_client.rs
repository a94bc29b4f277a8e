//! Client for the hosted image model.
//!
//! Each pipeline stage is a single request carrying the input image and a
//! fixed instruction; the response must contain exactly the output image.
//! Nothing is retried or cached here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransformError;
use crate::models::{
    ApiKey, AppConfig, DataUri, DataUriError, ModelConfig, PromptConfig, SafetyConfig,
    SafetySetting,
};

/// Longest slice of an error body kept in failure reasons
const MAX_ERROR_BODY: usize = 200;

/// Pipeline stage a remote call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStage {
    Isolate,
    Stylize,
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformStage::Isolate => write!(f, "isolate subject"),
            TransformStage::Stylize => write!(f, "stylize portrait"),
        }
    }
}

/// One image-plus-instruction request to the model
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub image: DataUri,
    pub instruction: String,
    pub safety_settings: Vec<SafetySetting>,
}

/// Error from the model transport
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request blocked by the model: {0}")]
    Blocked(String),

    #[error("Model returned no image (finish reason: {})", .0.as_deref().unwrap_or("unknown"))]
    NoImage(Option<String>),

    #[error("Model returned an unusable image: {0}")]
    InvalidImage(#[from] DataUriError),
}

/// A remote model that turns an image plus an instruction into an image
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(
        &self,
        request: GenerateRequest,
        credential: &ApiKey,
    ) -> Result<DataUri, ModelError>;
}

// Wire types for the generateContent REST call

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentRequest {
    fn from_request(request: GenerateRequest) -> Self {
        let GenerateRequest {
            image,
            instruction,
            safety_settings,
        } = request;

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: image.mime().to_string(),
                            data: image.payload().to_string(),
                        }),
                        ..Default::default()
                    },
                    Part {
                        text: Some(instruction),
                        ..Default::default()
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
            safety_settings,
        }
    }
}

impl GenerateContentResponse {
    /// Pull the first inline image out of the response
    fn into_image(self) -> Result<DataUri, ModelError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(reason));
        }

        let mut finish_reason = None;
        for candidate in self.candidates {
            if finish_reason.is_none() {
                finish_reason = candidate.finish_reason;
            }
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            if let Some(data) = parts.into_iter().find_map(|p| p.inline_data) {
                return Ok(DataUri::from_base64(data.mime_type, data.data)?);
            }
        }

        Err(ModelError::NoImage(finish_reason))
    }
}

/// Gemini `generateContent` over HTTPS
pub struct GeminiModel {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl GeminiModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("pixelme/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.name.clone(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }
}

#[async_trait]
impl ImageModel for GeminiModel {
    async fn generate(
        &self,
        request: GenerateRequest,
        credential: &ApiKey,
    ) -> Result<DataUri, ModelError> {
        let body = GenerateContentRequest::from_request(request);

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", credential.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed.into_image()
    }
}

/// The two pipeline operations on top of an [`ImageModel`]
pub struct TransformClient {
    model: Arc<dyn ImageModel>,
    prompts: PromptConfig,
    safety: SafetyConfig,
}

impl TransformClient {
    pub fn new(model: Arc<dyn ImageModel>, prompts: PromptConfig, safety: SafetyConfig) -> Self {
        Self {
            model,
            prompts,
            safety,
        }
    }

    /// Client talking to the configured Gemini endpoint
    pub fn from_config(config: &AppConfig) -> Result<Self, ModelError> {
        let model = Arc::new(GeminiModel::new(&config.model)?);
        Ok(Self::new(
            model,
            config.prompts.clone(),
            config.safety.clone(),
        ))
    }

    /// Crop the photo down to its subject
    pub async fn isolate_subject(
        &self,
        image: &DataUri,
        credential: Option<&ApiKey>,
    ) -> Result<DataUri, TransformError> {
        self.transform(TransformStage::Isolate, image, credential)
            .await
    }

    /// Turn an isolated subject into the pixel art portrait
    pub async fn stylize(
        &self,
        image: &DataUri,
        credential: Option<&ApiKey>,
    ) -> Result<DataUri, TransformError> {
        self.transform(TransformStage::Stylize, image, credential)
            .await
    }

    /// Build the request a stage would send
    pub fn request_for(&self, stage: TransformStage, image: &DataUri) -> GenerateRequest {
        let (instruction, safety_settings) = match stage {
            TransformStage::Isolate => (&self.prompts.isolate, &self.safety.isolate),
            TransformStage::Stylize => (&self.prompts.stylize, &self.safety.stylize),
        };

        GenerateRequest {
            image: image.clone(),
            instruction: instruction.clone(),
            safety_settings: safety_settings.clone(),
        }
    }

    async fn transform(
        &self,
        stage: TransformStage,
        image: &DataUri,
        credential: Option<&ApiKey>,
    ) -> Result<DataUri, TransformError> {
        let credential = credential.ok_or(TransformError::MissingCredential)?;
        let request = self.request_for(stage, image);

        tracing::info!(
            stage = %stage,
            input_mime = image.mime(),
            input_len = image.payload().len(),
            key = %credential.hint(),
            "Sending transform request"
        );

        match self.model.generate(request, credential).await {
            Ok(output) => {
                tracing::info!(
                    stage = %stage,
                    output_mime = output.mime(),
                    output_len = output.payload().len(),
                    "Transform succeeded"
                );
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Transform failed");
                Err(TransformError::processing(stage, e.to_string()))
            }
        }
    }
}
