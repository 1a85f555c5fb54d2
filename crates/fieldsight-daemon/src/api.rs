//! REST API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use fieldsight_core::{PosePayload, SettingsDoc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// List available field packages
pub async fn list_fields(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.field_catalog())
}

/// Get the current settings document
pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.settings().await)
}

/// Replace and persist the settings document
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(doc): Json<SettingsDoc>,
) -> impl IntoResponse {
    match state.save_settings(doc).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Failed to persist settings: {}", e))),
        )
            .into_response(),
    }
}

/// Ingest a pose update from the producer and fan it out to viewers.
///
/// Malformed payloads are rejected here so clients only ever see valid
/// poses on the channel.
pub async fn post_pose(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PosePayload>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        debug!(error = %e, "Rejected pose update");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(format!("Invalid pose: {}", e))),
        )
            .into_response();
    }

    state.publish_pose(payload);
    StatusCode::ACCEPTED.into_response()
}

/// Basic daemon info
pub async fn get_info() -> impl IntoResponse {
    #[derive(Serialize)]
    struct Info {
        name: &'static str,
        version: &'static str,
    }
    info!("Info requested");
    Json(Info {
        name: "fieldsight",
        version: env!("CARGO_PKG_VERSION"),
    })
}
