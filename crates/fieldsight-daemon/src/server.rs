//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::api;
use crate::state::AppState;
use crate::ws;

/// Run the web server
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    // Build router
    let app = Router::new()
        // API routes
        .route("/api/info", get(api::get_info))
        .route("/api/fields", get(api::list_fields))
        .route("/api/settings", get(api::get_settings))
        .route("/api/settings", post(api::update_settings))
        .route("/api/pose", post(api::post_pose))
        // WebSocket for real-time pose updates
        .route("/ws", get(ws::websocket_handler))
        // Serve field packages and tag textures
        .nest_service("/fields", ServeDir::new(&state.config.assets.fields_path))
        .nest_service(
            "/apriltags",
            ServeDir::new(&state.config.assets.apriltags_path),
        )
        // Static files (WASM frontend) - must be fallback for root
        .fallback_service(ServeDir::new(&state.config.assets.web_path))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // State
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}
