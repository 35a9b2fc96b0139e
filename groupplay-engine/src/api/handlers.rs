//! HTTP request handlers

use crate::api::AppState;
use crate::error::Error;
use crate::playback::{Command, CommandContext, QueueSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use groupplay_common::GroupId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// Command text, e.g. `play https://...` or `delete 2`
    pub command: String,
    /// Channel to join when the command needs a connection
    #[serde(default)]
    pub channel: Option<String>,
    /// Where notifications go; defaults to the group id
    #[serde(default)]
    pub notify_target: Option<String>,
    #[serde(default)]
    pub acknowledge: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupsResponse {
    pub groups: Vec<GroupId>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

/// HTTP status for an engine error
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        Error::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        Error::NotConnected | Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Resolution(_) | Error::Search(_) | Error::Sink(_) => StatusCode::BAD_GATEWAY,
        Error::Config(_) | Error::Io(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn api_error(error: &Error) -> ApiError {
    (
        status_for(error),
        Json(StatusResponse {
            status: error.to_string(),
        }),
    )
}

// ============================================================================
// Endpoints
// ============================================================================

/// POST /api/v1/groups/:group_id/commands
pub async fn post_command(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let command: Command = request.command.parse().map_err(|e| api_error(&e))?;

    let target = request.notify_target.unwrap_or_else(|| group_id.clone());
    let mut ctx = CommandContext::new(group_id, target);
    ctx.channel = request.channel;
    ctx.acknowledge = request.acknowledge;

    debug!("Command for {}: {}", ctx.group_id, command);
    state
        .controller
        .dispatch(&ctx, command)
        .await
        .map_err(|e| api_error(&e))?;

    Ok(Json(StatusResponse::ok()))
}

/// GET /api/v1/groups/:group_id/queue
pub async fn get_queue(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<QueueSnapshot>, ApiError> {
    let group_id = GroupId::new(group_id);
    match state.controller.snapshot(&group_id).await {
        Some(snapshot) => Ok(Json(snapshot)),
        None => {
            info!("Queue requested for unknown group {}", group_id);
            Err((
                StatusCode::NOT_FOUND,
                Json(StatusResponse {
                    status: format!("Unknown group: {}", group_id),
                }),
            ))
        }
    }
}

/// GET /api/v1/groups
pub async fn list_groups(State(state): State<AppState>) -> Json<GroupsResponse> {
    Json(GroupsResponse {
        groups: state.controller.registry().groups().await,
    })
}
