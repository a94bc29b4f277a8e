use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::headers::{session_id, HeaderMapExt, SessionQuery, SESSION_HEADER};
use crate::error::ApiError;
use crate::models::SessionId;
use crate::services::SessionRegistry;

/// A session ready for use
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Send this as the `Session-Id` header (or `?session=`) from now on
    pub session_id: String,
}

/// Open a session for a browser tab
///
/// With a `Session-Id` the tab resumes that session, recreating it if it was
/// dropped while idle. Without one a new ID is issued.
#[utoipa::path(
    post,
    path = "/api/session",
    responses(
        (status = 200, description = "Existing session resumed", body = SessionResponse),
        (status = 201, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Invalid session ID"),
    ),
    params(
        ("Session-Id" = Option<String>, Header, description = "Session to resume"),
    ),
    tag = "Run"
)]
pub async fn handle_new_session<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let resuming = headers.get_str(SESSION_HEADER).is_some() || query.session.is_some();
    let (id, status) = if resuming {
        (session_id(&headers, &query)?, StatusCode::OK)
    } else {
        (SessionId::generate(), StatusCode::CREATED)
    };

    let session = sessions.get_or_create(&id).await;
    tracing::debug!(session = %session.id, resumed = resuming, "Session opened");

    Ok((
        status,
        Json(SessionResponse {
            session_id: session.id.to_string(),
        }),
    ))
}
