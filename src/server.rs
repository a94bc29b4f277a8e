//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header::CACHE_CONTROL, HeaderValue},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::api;
use crate::assets::UiAssets;
use crate::models::AppConfig;
use crate::services::{InMemorySessionRegistry, TransformClient};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<InMemorySessionRegistry>,
    pub assets: Arc<UiAssets>,
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<InMemorySessionRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<UiAssets> {
    fn from_ref(state: &AppState) -> Self {
        state.assets.clone()
    }
}

/// Create application state talking to the configured model endpoint.
pub fn create_app_state(config: AppConfig, ui_dir: Option<PathBuf>) -> anyhow::Result<AppState> {
    let client = TransformClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create model client: {e}"))?;
    Ok(create_app_state_with_client(config, client, UiAssets::new(ui_dir)))
}

/// Create application state around an existing transform client.
pub fn create_app_state_with_client(
    config: AppConfig,
    client: TransformClient,
    assets: UiAssets,
) -> AppState {
    let sessions = Arc::new(InMemorySessionRegistry::new(
        Arc::new(client),
        config.default_api_key(),
    ));

    AppState {
        config: Arc::new(config),
        sessions,
        assets: Arc::new(assets),
    }
}

/// Build the router with all endpoints and middleware.
///
/// This is the core router used by both production and tests. Responses
/// carry `Cache-Control: no-store` unless a handler sets its own, since
/// they contain users' photos.
pub fn build_router(state: AppState) -> Router {
    type Sessions = InMemorySessionRegistry;

    let upload_limit = state.config.upload_limit_bytes;

    Router::new()
        // Session
        .route("/api/session", post(api::handle_new_session::<Sessions>))
        // Pipeline run
        .route(
            "/api/run",
            get(api::handle_get_run::<Sessions>).post(api::handle_submit::<Sessions>),
        )
        .route("/api/run/reset", post(api::handle_reset::<Sessions>))
        .route("/api/run/download", get(api::handle_download::<Sessions>))
        .route("/api/run/share", get(api::handle_share::<Sessions>))
        .route("/api/run/events", get(api::handle_events::<Sessions>))
        // Session credential
        .route(
            "/api/credential",
            get(api::handle_get_credential::<Sessions>)
                .post(api::handle_set_credential::<Sessions>)
                .delete(api::handle_clear_credential::<Sessions>),
        )
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Single-page app
        .fallback(api::handle_asset)
        .layer(DefaultBodyLimit::max(upload_limit))
        // Add state and tracing
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
