//! HTTP command surface
//!
//! Commands are posted per group as text (`play <ref>`, `next`, ...) and
//! dispatched through the controller. Queue snapshots and an SSE event
//! stream expose the resulting state.

pub mod handlers;
pub mod sse;

use crate::playback::PlaybackController;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use groupplay_common::events::EventBus;
use serde_json::json;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<PlaybackController>,
    pub events: Arc<EventBus>,
    /// Server port
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                .route("/groups", get(handlers::list_groups))
                .route("/groups/:group_id/commands", post(handlers::post_command))
                .route("/groups/:group_id/queue", get(handlers::get_queue))
                .route("/events", get(sse::event_stream)),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "groupplay",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
        "groups": state.controller.registry().len().await,
    }))
}
