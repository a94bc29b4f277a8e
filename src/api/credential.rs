use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::headers::{session_id, SessionQuery};
use crate::error::ApiError;
use crate::models::{ApiKey, AppConfig};
use crate::services::{CredentialSource, Session, SessionRegistry};

/// Request body for storing a session API key
#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialRequest {
    /// Google AI API key, kept in memory for this session only
    pub api_key: String,
}

/// Which credential a session would use
#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialStatus {
    /// Whether runs can reach the model
    pub configured: bool,
    pub source: CredentialSource,
}

impl CredentialStatus {
    fn from_source(source: CredentialSource) -> Self {
        Self {
            configured: source != CredentialSource::None,
            source,
        }
    }

    async fn of(session: &Session) -> Self {
        Self::from_source(session.credentials.source().await)
    }
}

/// Report whether a credential is available
///
/// A session that has never been used reports the server default.
#[utoipa::path(
    get,
    path = "/api/credential",
    responses(
        (status = 200, description = "Credential status", body = CredentialStatus),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Credential"
)]
pub async fn handle_get_credential<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Json<CredentialStatus>, ApiError> {
    let id = session_id(&headers, &query)?;
    let status = match sessions.find(&id).await {
        Some(session) => CredentialStatus::of(&session).await,
        None if config.default_api_key().is_some() => {
            CredentialStatus::from_source(CredentialSource::Server)
        }
        None => CredentialStatus::from_source(CredentialSource::None),
    };
    Ok(Json(status))
}

/// Store an API key for this session
#[utoipa::path(
    post,
    path = "/api/credential",
    request_body = CredentialRequest,
    responses(
        (status = 200, description = "Key stored", body = CredentialStatus),
        (status = 400, description = "Blank key or missing session"),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Credential"
)]
pub async fn handle_set_credential<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<CredentialStatus>, ApiError> {
    let id = session_id(&headers, &query)?;
    let key = ApiKey::new(request.api_key).ok_or(ApiError::BlankApiKey)?;

    let session = sessions.get_or_create(&id).await;
    tracing::info!(session = %id, key = %key.hint(), "Session API key stored");
    session.credentials.set(key).await;

    Ok(Json(CredentialStatus::of(&session).await))
}

/// Forget this session's API key
#[utoipa::path(
    delete,
    path = "/api/credential",
    responses(
        (status = 200, description = "Key removed", body = CredentialStatus),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Credential"
)]
pub async fn handle_clear_credential<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Json<CredentialStatus>, ApiError> {
    let id = session_id(&headers, &query)?;
    let session = sessions.get_or_create(&id).await;
    session.credentials.clear().await;
    tracing::info!(session = %id, "Session API key cleared");

    Ok(Json(CredentialStatus::of(&session).await))
}
