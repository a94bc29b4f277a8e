use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures_util::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use utoipa::ToSchema;

use super::headers::{session_id, SessionQuery};
use crate::error::ApiError;
use crate::models::{DataUri, PipelineRun, RunSnapshot};
use crate::services::{SessionRegistry, SharePayload, PORTRAIT_FILE_NAME};

/// Request body for starting a run
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Source photo as a data URI (`data:image/png;base64,...`)
    pub image: String,
}

/// Start a new run for an uploaded photo
///
/// The photo is isolated and stylized in the background; poll
/// `/api/run` or follow `/api/run/events` for progress.
#[utoipa::path(
    post,
    path = "/api/run",
    request_body = SubmitRequest,
    responses(
        (status = 202, description = "Run started", body = RunSnapshot),
        (status = 400, description = "Missing session or invalid image"),
        (status = 409, description = "A run is already in progress"),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Run"
)]
pub async fn handle_submit<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = session_id(&headers, &query)?;

    let image = DataUri::parse(&request.image)?;
    if !image.is_supported_upload() {
        return Err(ApiError::UnsupportedFormat(image.mime().to_string()));
    }

    let session = sessions.get_or_create(&id).await;
    let credential = session.credentials.resolve().await;

    let handle = session.controller.submit(image, credential).await?;
    tracing::info!(session = %id, run_id = handle.run_id(), "Run submitted");

    let snapshot = session.controller.snapshot().await;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Get the current run
///
/// A session that has never been used reports an empty run.
#[utoipa::path(
    get,
    path = "/api/run",
    responses(
        (status = 200, description = "Current run state", body = RunSnapshot),
        (status = 400, description = "Missing session"),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Run"
)]
pub async fn handle_get_run<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Json<RunSnapshot>, ApiError> {
    let id = session_id(&headers, &query)?;
    let snapshot = match sessions.find(&id).await {
        Some(session) => session.controller.snapshot().await,
        None => PipelineRun::default().snapshot(),
    };
    Ok(Json(snapshot))
}

/// Discard the current run
///
/// Always allowed. A remote call still in flight is left to finish and
/// its result is ignored.
#[utoipa::path(
    post,
    path = "/api/run/reset",
    responses(
        (status = 200, description = "Run reset", body = RunSnapshot),
        (status = 400, description = "Missing session"),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Run"
)]
pub async fn handle_reset<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Json<RunSnapshot>, ApiError> {
    let id = session_id(&headers, &query)?;
    let session = sessions.get_or_create(&id).await;
    let snapshot = session.controller.reset().await;
    tracing::info!(session = %id, run_id = snapshot.run_id, "Run reset");
    Ok(Json(snapshot))
}

/// Download the finished portrait
#[utoipa::path(
    get,
    path = "/api/run/download",
    responses(
        (status = 200, description = "Portrait image", body = [u8], content_type = "image/png"),
        (status = 404, description = "No finished portrait"),
    ),
    params(SessionQuery),
    tag = "Run"
)]
pub async fn handle_download<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = session_id(&headers, &query)?;
    let session = sessions.find(&id).await.ok_or(ApiError::NotFound)?;
    let run = session.controller.current().await;
    let image = run.final_image.ok_or(ApiError::NotFound)?;

    let bytes = image.decode();
    tracing::debug!(session = %id, size = bytes.len(), "Serving portrait download");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.mime().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{PORTRAIT_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Get the native share payload for the finished portrait
///
/// Failure here never changes the run.
#[utoipa::path(
    get,
    path = "/api/run/share",
    responses(
        (status = 200, description = "Share payload", body = SharePayload),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Nothing to share"),
    ),
    params(
        ("Session-Id" = String, Header, description = "Browser tab session ID"),
    ),
    tag = "Run"
)]
pub async fn handle_share<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Json<SharePayload>, ApiError> {
    let id = session_id(&headers, &query)?;
    let session = sessions.find(&id).await.ok_or(ApiError::NotFound)?;
    let run = session.controller.current().await;
    Ok(Json(SharePayload::for_run(&run)?))
}

/// Stream run snapshots as server-sent events
///
/// The current snapshot is sent first, then one `run` event per transition.
/// The session must already exist (see `POST /api/session`).
#[utoipa::path(
    get,
    path = "/api/run/events",
    responses(
        (status = 200, description = "Event stream of run snapshots", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing session"),
        (status = 404, description = "Unknown session"),
    ),
    params(SessionQuery),
    tag = "Run"
)]
pub async fn handle_events<R: SessionRegistry>(
    State(sessions): State<Arc<R>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = session_id(&headers, &query)?;
    let session = sessions.find(&id).await.ok_or(ApiError::NotFound)?;

    // Subscribe before reading the snapshot so no transition is missed
    let rx = session.controller.subscribe();
    let current = session.controller.snapshot().await;

    let updates = BroadcastStream::new(rx).map(|result| match result {
        Ok(snapshot) => Ok(run_event(&snapshot)),
        // Lagged - tell the client to refetch
        Err(_) => Ok(Event::default().event("refresh").data("lagged")),
    });
    let stream = tokio_stream::once(Ok(run_event(&current))).chain(updates);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn run_event(snapshot: &RunSnapshot) -> Event {
    Event::default()
        .event("run")
        .data(serde_json::to_string(snapshot).unwrap_or_default())
}
