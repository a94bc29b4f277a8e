use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::DataUriError;
use crate::services::controller::PipelineError;
use crate::services::share::ShareError;
use crate::services::transform_client::TransformStage;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] DataUriError),

    #[error("Unsupported image type: {0} (expected PNG, JPEG or WebP)")]
    UnsupportedFormat(String),

    #[error("API key must not be blank")]
    BlankApiKey,

    #[error("A run is already in progress")]
    Busy,

    #[error("Share failed: {0}")]
    Share(#[from] ShareError),

    #[error("Not found")]
    NotFound,
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Busy { .. } => ApiError::Busy,
        }
    }
}

/// Failure of a single remote transform call
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    #[error("No API key configured for the image model")]
    MissingCredential,

    #[error("Failed to {stage}: {reason}")]
    ProcessingFailure {
        stage: TransformStage,
        reason: String,
    },
}

impl TransformError {
    pub fn processing(stage: TransformStage, reason: impl Into<String>) -> Self {
        TransformError::ProcessingFailure {
            stage,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidHeader(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::BlankApiKey => StatusCode::BAD_REQUEST,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::Share(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_missing_header() {
        let error = ApiError::MissingHeader("Session-Id");
        assert_eq!(error.to_string(), "Missing required header: Session-Id");
    }

    #[test]
    fn test_api_error_invalid_image() {
        let error: ApiError = DataUriError::MissingScheme.into();
        assert_eq!(
            error.to_string(),
            "Invalid image: Data URI must start with 'data:'"
        );
    }

    #[test]
    fn test_api_error_unsupported_format() {
        let error = ApiError::UnsupportedFormat("image/gif".to_string());
        assert_eq!(
            error.to_string(),
            "Unsupported image type: image/gif (expected PNG, JPEG or WebP)"
        );
    }

    #[test]
    fn test_api_error_from_pipeline_busy() {
        let error: ApiError = PipelineError::Busy { run_id: 4 }.into();
        assert!(matches!(error, ApiError::Busy));
    }

    #[test]
    fn test_transform_error_messages() {
        assert_eq!(
            TransformError::MissingCredential.to_string(),
            "No API key configured for the image model"
        );
        assert_eq!(
            TransformError::processing(TransformStage::Isolate, "timed out").to_string(),
            "Failed to isolate subject: timed out"
        );
        assert_eq!(
            TransformError::processing(TransformStage::Stylize, "no image").to_string(),
            "Failed to stylize portrait: no image"
        );
    }

    #[test]
    fn test_api_error_into_response_status_codes() {
        let response = ApiError::MissingHeader("Session-Id").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::InvalidHeader("Session-Id").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::InvalidImage(DataUriError::NotBase64).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::UnsupportedFormat("image/gif".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::BlankApiKey.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::Busy.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError::Share(ShareError::NothingToShare).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
