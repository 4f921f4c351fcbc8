// --------------------------------------------------
// Handles API endpoints for the running challenge.
//
// Responsibilities:
// - Read the current state with its completion percentage
// - Start / reset a run, advance days, switch modes
// - Toggle tasks and edit the day's reflection
// - Read / clear history, export / import snapshots
// -------------------------------------------------

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::logic::Action;
use crate::models::{ChallengeState, DayState, Mode};
use crate::schema::{Snapshot, StoredState};
use crate::state::SharedStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub state: ChallengeState,
    pub completion_percent: f64,
    pub completion: u8,
    pub active_tasks: Vec<ActiveTask>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ActiveTask {
    pub id: String,
    pub label: String,
    pub done: bool,
}

impl StateResponse {
    pub fn from_state(state: &ChallengeState) -> Self {
        Self {
            completion_percent: state.current_day.completion_percent(),
            completion: state.current_day.completion_rounded(),
            active_tasks: active_tasks(state),
            state: state.clone(),
        }
    }
}

// Checklist rows for the current day in definition order.
// Keys without a definition in the active mode (left over from a mid-run
// mode switch) follow, labelled from whichever mode still defines them.
fn active_tasks(state: &ChallengeState) -> Vec<ActiveTask> {
    let tasks = &state.current_day.tasks;
    let defs = state.definitions(state.mode);

    let mut rows: Vec<ActiveTask> = defs
        .iter()
        .filter_map(|d| {
            tasks.get(&d.id).map(|done| ActiveTask {
                id: d.id.clone(),
                label: d.label.clone(),
                done: *done,
            })
        })
        .collect();

    for (id, done) in tasks {
        if defs.iter().any(|d| &d.id == id) {
            continue;
        }
        let label = Mode::ALL
            .into_iter()
            .flat_map(|m| state.definitions(m))
            .find(|d| &d.id == id)
            .map(|d| d.label.clone())
            .unwrap_or_else(|| id.clone());
        rows.push(ActiveTask {
            id: id.clone(),
            label,
            done: *done,
        });
    }
    rows
}

pub async fn dispatch(store: &SharedStore, action: Action) -> StateResponse {
    let mut store = store.write().await;
    StateResponse::from_state(store.dispatch(action))
}

// -----------------------------
// GET /api/state
// Returns the whole challenge state plus derived completion
// -----------------------------
pub async fn get_state(State(store): State<SharedStore>) -> impl IntoResponse {
    let store = store.read().await;
    Json(StateResponse::from_state(store.state()))
}

// -----------------------------
// POST /api/actions
// Applies any named transition, e.g. {"type":"nextDay"}
// -----------------------------
pub async fn apply_action(
    State(store): State<SharedStore>,
    Json(action): Json<Action>,
) -> impl IntoResponse {
    Json(dispatch(&store, action).await)
}

#[derive(Debug, Default, Deserialize)]
pub struct StartInput {
    pub mode: Option<String>,
}

// -----------------------------
// POST /api/challenge/start
// Starts a run at day 1; body {"mode": "HARD"} is optional,
// but a body that is present must be valid JSON
// -----------------------------
pub async fn start_challenge(State(store): State<SharedStore>, body: Bytes) -> Response {
    let input: StartInput = if body.iter().all(u8::is_ascii_whitespace) {
        StartInput::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(i) => i,
            Err(_) => return (StatusCode::BAD_REQUEST, "invalid body").into_response(),
        }
    };
    let mode = match input.mode.as_deref().map(str::parse::<Mode>).transpose() {
        Ok(m) => m,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid mode").into_response(),
    };
    Json(dispatch(&store, Action::start(mode)).await).into_response()
}

// -----------------------------
// POST /api/challenge/toggle/:task_id
// Flips one task of the current day
// -----------------------------
pub async fn toggle_task(
    State(store): State<SharedStore>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    Json(dispatch(&store, Action::ToggleTask { task_id }).await)
}

#[derive(Debug, Deserialize)]
pub struct ReflectionInput {
    pub text: String,
}

// -----------------------------
// PUT /api/challenge/reflection
// Replaces the current day's reflection text as-is
// -----------------------------
pub async fn set_reflection(
    State(store): State<SharedStore>,
    Json(input): Json<ReflectionInput>,
) -> impl IntoResponse {
    Json(dispatch(&store, Action::SetReflection { text: input.text }).await)
}

// -----------------------------
// POST /api/challenge/next-day
// Archives the current day and opens the next one
// -----------------------------
pub async fn next_day(State(store): State<SharedStore>) -> impl IntoResponse {
    Json(dispatch(&store, Action::NextDay).await)
}

// -----------------------------
// POST /api/challenge/reset
// Restarts the run at day 1, history is kept
// -----------------------------
pub async fn reset_challenge(State(store): State<SharedStore>) -> impl IntoResponse {
    Json(dispatch(&store, Action::ResetChallenge).await)
}

#[derive(Debug, Deserialize)]
pub struct ModeInput {
    pub mode: String,
}

// -----------------------------
// PUT /api/challenge/mode
// Switches difficulty mode
// -----------------------------
pub async fn set_mode(
    State(store): State<SharedStore>,
    Json(input): Json<ModeInput>,
) -> Response {
    let Ok(mode) = input.mode.parse::<Mode>() else {
        return (StatusCode::BAD_REQUEST, "invalid mode").into_response();
    };
    Json(dispatch(&store, Action::SetMode { mode }).await).into_response()
}

// -----------------------------
// GET /api/history
// Completed days, oldest first
// -----------------------------
pub async fn get_history(State(store): State<SharedStore>) -> impl IntoResponse {
    let store = store.read().await;
    let history: Vec<DayState> = store.state().history.clone();
    Json(history)
}

// -----------------------------
// DELETE /api/history
// -----------------------------
pub async fn clear_history(State(store): State<SharedStore>) -> impl IntoResponse {
    Json(dispatch(&store, Action::ClearHistory).await)
}

// -----------------------------
// GET /api/export
// Returns the snapshot exactly as it is written to disk
// -----------------------------
pub async fn export_snapshot(State(store): State<SharedStore>) -> Response {
    let store = store.read().await;
    Json(Snapshot::new(store.state())).into_response()
}

// -----------------------------
// POST /api/import
// Hydrates from an uploaded snapshot (any known schema version)
// -----------------------------
pub async fn import_snapshot(
    State(store): State<SharedStore>,
    Json(snapshot): Json<StoredState>,
) -> impl IntoResponse {
    Json(dispatch(&store, Action::Hydrate(Some(snapshot))).await)
}
