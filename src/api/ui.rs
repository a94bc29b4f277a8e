use axum::{
    extract::State,
    http::{header, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::assets::UiAssets;
use crate::error::ApiError;

/// Serve the single-page app and its static files
pub async fn handle_asset(
    State(assets): State<Arc<UiAssets>>,
    uri: Uri,
) -> Result<Response, ApiError> {
    let asset = assets.get(uri.path()).ok_or(ApiError::NotFound)?;

    Ok((
        [
            (header::CONTENT_TYPE, asset.mime_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        asset.content.into_owned(),
    )
        .into_response())
}
