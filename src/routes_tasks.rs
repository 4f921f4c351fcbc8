// --------------------------------------------------
// Handles API endpoints for per-mode task definitions.
//
// Responsibilities:
// - List / create / relabel / delete task definitions
// - Restore a mode's built-in checklist
// -------------------------------------------------

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::logic::Action;
use crate::models::{Mode, TaskDefinition};
use crate::routes_challenge::{dispatch, StateResponse};
use crate::state::SharedStore;

fn parse_mode(raw: &str) -> Result<Mode, Response> {
    raw.parse::<Mode>()
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid mode").into_response())
}

#[derive(Debug, Deserialize)]
pub struct TaskLabelInput {
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedTask {
    pub task: TaskDefinition,
    #[serde(flatten)]
    pub view: StateResponse,
}

// -----------------------------
// GET /api/tasks/:mode
// Task definitions of one mode, in display order
// -----------------------------
pub async fn list_tasks(State(store): State<SharedStore>, Path(mode): Path<String>) -> Response {
    let mode = match parse_mode(&mode) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let store = store.read().await;
    let defs: Vec<TaskDefinition> = store.state().definitions(mode).to_vec();
    Json(defs).into_response()
}

// -----------------------------
// POST /api/tasks/:mode
// Adds a task definition and returns it with the new state
// -----------------------------
pub async fn create_task(
    State(store): State<SharedStore>,
    Path(mode): Path<String>,
    Json(input): Json<TaskLabelInput>,
) -> Response {
    let mode = match parse_mode(&mode) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    if input.label.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "label required").into_response();
    }

    let mut store = store.write().await;
    let state = store.dispatch(Action::AddTask {
        mode,
        label: input.label,
    });

    // addTask appends, so the new definition is the last one
    let Some(task) = state.definitions(mode).last().cloned() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "task was not added").into_response();
    };

    (
        StatusCode::CREATED,
        Json(CreatedTask {
            task,
            view: StateResponse::from_state(state),
        }),
    )
        .into_response()
}

// -----------------------------
// PUT /api/tasks/:mode/:id
// Relabels a task definition
// -----------------------------
pub async fn update_task(
    State(store): State<SharedStore>,
    Path((mode, id)): Path<(String, String)>,
    Json(input): Json<TaskLabelInput>,
) -> Response {
    let mode = match parse_mode(&mode) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    if input.label.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "label required").into_response();
    }

    let mut store = store.write().await;
    if !store.state().definitions(mode).iter().any(|d| d.id == id) {
        return (StatusCode::NOT_FOUND, "task not found").into_response();
    }

    let state = store.dispatch(Action::UpdateTaskLabel {
        mode,
        task_id: id,
        label: input.label,
    });
    Json(StateResponse::from_state(state)).into_response()
}

// -----------------------------
// DELETE /api/tasks/:mode/:id
// Removes a task definition (and its checkbox if the mode is active)
// -----------------------------
pub async fn delete_task(
    State(store): State<SharedStore>,
    Path((mode, id)): Path<(String, String)>,
) -> Response {
    let mode = match parse_mode(&mode) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let mut store = store.write().await;
    if !store.state().definitions(mode).iter().any(|d| d.id == id) {
        return (StatusCode::NOT_FOUND, "task not found").into_response();
    }

    let state = store.dispatch(Action::RemoveTask { mode, task_id: id });
    Json(StateResponse::from_state(state)).into_response()
}

// -----------------------------
// POST /api/reset-tasks/:mode
// Restores the built-in checklist for a mode
// -----------------------------
pub async fn reset_tasks(State(store): State<SharedStore>, Path(mode): Path<String>) -> Response {
    let mode = match parse_mode(&mode) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    Json(dispatch(&store, Action::ResetTasksForMode { mode }).await).into_response()
}
