use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::board::CommitOutcome;
use crate::error::BoardError;
use crate::models::*;
use crate::ranking::DropTarget;
use crate::store::SprintStore;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
///
/// Validation failures raised by the database layer are safe to expose and
/// are passed through with a matching status.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("not found") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::NOT_FOUND, msg);
    }
    if msg.contains("already exists") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::CONFLICT, msg);
    }
    if msg.contains("before its start date") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::BAD_REQUEST, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn board_error(e: BoardError) -> (StatusCode, String) {
    match e {
        BoardError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        BoardError::InvalidMove(_) | BoardError::InvalidSprintId(_) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        BoardError::Busy => (StatusCode::CONFLICT, e.to_string()),
        BoardError::WriteFailure { .. } => {
            tracing::error!("{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to move epic, please try again".to_string(),
            )
        }
        BoardError::Store(err) => internal_error(format!("{:#}", err)),
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Sprints
// ============================================================

pub async fn list_sprints(State(state): State<AppState>) -> ApiResult<Json<Vec<Sprint>>> {
    state.db.get_all_sprints().map(Json).map_err(internal_error)
}

pub async fn create_sprint(
    State(state): State<AppState>,
    Json(input): Json<CreateSprintInput>,
) -> ApiResult<(StatusCode, Json<Sprint>)> {
    state
        .db
        .create_sprint(input)
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(internal_error)
}

pub async fn get_sprint(
    State(state): State<AppState>,
    Path(id): Path<SprintId>,
) -> ApiResult<Json<SprintView>> {
    state
        .db
        .get_sprint_with_epics(&id)
        .map_err(internal_error)?
        .map(|s| Json(SprintView::from(s)))
        .ok_or((StatusCode::NOT_FOUND, "Sprint not found".to_string()))
}

// ============================================================
// Board
// ============================================================

/// Query parameters for rendering the board. Lists are comma-separated ids.
#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    pub collapsed: Option<String>,
    pub sprint: Option<String>,
    #[serde(default)]
    pub hide_ungrouped: bool,
}

impl BoardQuery {
    fn into_options(self) -> Result<BoardViewOptions, BoardError> {
        Ok(BoardViewOptions {
            collapsed: parse_ids(self.collapsed.as_deref())?.unwrap_or_default(),
            only: parse_ids(self.sprint.as_deref())?,
            hide_ungrouped: self.hide_ungrouped,
        })
    }
}

fn parse_ids(raw: Option<&str>) -> Result<Option<BTreeSet<SprintId>>, BoardError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SprintId::new)
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(Some(ids))
}

pub async fn get_board(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> ApiResult<Json<BoardView>> {
    let options = query.into_options().map_err(board_error)?;
    let board = state.db.load_board().await.map_err(internal_error)?;
    Ok(Json(options.view(board)))
}

/// A completed drag: `epic_id` was dropped on `target`.
#[derive(Debug, Deserialize)]
pub struct MoveEpicInput {
    pub epic_id: Uuid,
    pub target: DropTarget,
}

pub async fn move_epic(
    State(state): State<AppState>,
    Json(input): Json<MoveEpicInput>,
) -> ApiResult<Json<CommitOutcome>> {
    state
        .board
        .commit_move(input.epic_id, input.target)
        .await
        .map(Json)
        .map_err(board_error)
}

// ============================================================
// Epics
// ============================================================

pub async fn list_ungrouped_epics(State(state): State<AppState>) -> ApiResult<Json<Vec<Epic>>> {
    state
        .db
        .get_epics_by_sprint(None)
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_epic(
    State(state): State<AppState>,
    Json(input): Json<CreateEpicInput>,
) -> ApiResult<(StatusCode, Json<Epic>)> {
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Epic name is required".to_string()));
    }
    state
        .db
        .create_epic(input)
        .map(|e| (StatusCode::CREATED, Json(e)))
        .map_err(internal_error)
}

pub async fn get_epic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Epic>> {
    state
        .db
        .get_epic(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Epic not found".to_string()))
}

// ============================================================
// Work items
// ============================================================

pub async fn create_work_item(
    State(state): State<AppState>,
    Path(epic_id): Path<Uuid>,
    Json(input): Json<CreateWorkItemInput>,
) -> ApiResult<(StatusCode, Json<WorkItem>)> {
    state
        .db
        .create_work_item(epic_id, input)
        .map(|w| (StatusCode::CREATED, Json(w)))
        .map_err(internal_error)
}

pub async fn complete_work_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.db.complete_work_item(id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Work item not found".to_string()))
    }
}
