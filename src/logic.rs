/*
Challenge state transitions.
Module was independently written from HTTP / Axum for testing
*/

use std::collections::BTreeMap;
use std::mem;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{ChallengeState, DayState, Mode, TaskDefinition};
use crate::schema::{self, StoredState};

// Built-in checklists, in display order.
// Ids are stable so that resetting a mode restores exactly these entries.
const HARD_DEFAULTS: &[(&str, &str)] = &[
    ("workout1", "Workout 1 (45 min)"),
    ("workout2", "Workout 2 (45 min, must be outdoors)"),
    ("diet", "Follow your diet, no alcohol or cheat meals"),
    ("water", "Drink 1 gallon of water"),
    ("reading", "Read 10 pages (non-fiction)"),
    ("progress_pic", "Take a progress picture"),
];

const SOFT_DEFAULTS: &[(&str, &str)] = &[
    ("workout", "Workout (45 min, one active recovery day a week)"),
    ("diet", "Eat well, drink only on social occasions"),
    ("water", "Drink 3 litres of water"),
    ("reading", "Read 10 pages"),
];

/// A named transition and its payload.
///
/// JSON form: `{ "type": "toggleTask", "payload": { "taskId": "diet" } }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    Hydrate(Option<StoredState>),
    // payload may be absent or null: start in the current mode
    StartChallenge(Option<StartPayload>),
    ToggleTask {
        task_id: String,
    },
    SetReflection {
        text: String,
    },
    NextDay,
    ResetChallenge,
    SetMode {
        mode: Mode,
    },
    ClearHistory,
    AddTask {
        mode: Mode,
        label: String,
    },
    UpdateTaskLabel {
        mode: Mode,
        task_id: String,
        label: String,
    },
    RemoveTask {
        mode: Mode,
        task_id: String,
    },
    ResetTasksForMode {
        mode: Mode,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartPayload {
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl Action {
    pub fn start(mode: Option<Mode>) -> Self {
        Action::StartChallenge(Some(StartPayload { mode }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Hydrate(_) => "hydrate",
            Action::StartChallenge(_) => "startChallenge",
            Action::ToggleTask { .. } => "toggleTask",
            Action::SetReflection { .. } => "setReflection",
            Action::NextDay => "nextDay",
            Action::ResetChallenge => "resetChallenge",
            Action::SetMode { .. } => "setMode",
            Action::ClearHistory => "clearHistory",
            Action::AddTask { .. } => "addTask",
            Action::UpdateTaskLabel { .. } => "updateTaskLabel",
            Action::RemoveTask { .. } => "removeTask",
            Action::ResetTasksForMode { .. } => "resetTasksForMode",
        }
    }
}

pub fn now_fixed_offset() -> DateTime<FixedOffset> {
    chrono::Local::now().fixed_offset()
}

pub fn default_definitions(mode: Mode) -> Vec<TaskDefinition> {
    let table = match mode {
        Mode::Hard => HARD_DEFAULTS,
        Mode::Soft => SOFT_DEFAULTS,
    };
    table
        .iter()
        .map(|(id, label)| TaskDefinition::new(*id, *label, mode))
        .collect()
}

pub fn default_task_definitions() -> BTreeMap<Mode, Vec<TaskDefinition>> {
    Mode::ALL
        .into_iter()
        .map(|mode| (mode, default_definitions(mode)))
        .collect()
}

// All-false checklist over the given definitions.
pub fn fresh_tasks(defs: &[TaskDefinition]) -> BTreeMap<String, bool> {
    defs.iter().map(|d| (d.id.clone(), false)).collect()
}

// Same key set as `fresh_tasks`, keeping completion flags for ids that
// already existed in `previous`.
pub fn carry_over_tasks(
    defs: &[TaskDefinition],
    previous: &BTreeMap<String, bool>,
) -> BTreeMap<String, bool> {
    defs.iter()
        .map(|d| (d.id.clone(), previous.get(&d.id).copied().unwrap_or(false)))
        .collect()
}

pub fn make_new_day(day_number: u32, defs: &[TaskDefinition], now: DateTime<FixedOffset>) -> DayState {
    DayState {
        day_number,
        date: now,
        tasks: fresh_tasks(defs),
        reflection: String::new(),
    }
}

pub fn default_state(now: DateTime<FixedOffset>) -> ChallengeState {
    let task_definitions = default_task_definitions();
    let current_day = make_new_day(1, &default_definitions(Mode::Hard), now);
    ChallengeState {
        started_at: None,
        mode: Mode::Hard,
        task_definitions,
        current_day,
        history: Vec::new(),
    }
}

/// Apply one transition and return the next state. `state` is left untouched.
pub fn apply(state: &ChallengeState, action: Action, now: DateTime<FixedOffset>) -> ChallengeState {
    let mut draft = state.clone();
    reduce(&mut draft, action, now);
    draft
}

pub fn reduce(draft: &mut ChallengeState, action: Action, now: DateTime<FixedOffset>) {
    match action {
        Action::Hydrate(payload) => hydrate(draft, payload, now),
        Action::StartChallenge(payload) => {
            start_challenge(draft, payload.and_then(|p| p.mode), now)
        }
        Action::ToggleTask { task_id } => toggle_task(draft, &task_id),
        Action::SetReflection { text } => set_reflection(draft, text),
        Action::NextDay => next_day(draft, now),
        Action::ResetChallenge => reset_challenge(draft, now),
        Action::SetMode { mode } => set_mode(draft, mode, now),
        Action::ClearHistory => clear_history(draft),
        Action::AddTask { mode, label } => {
            add_task(draft, mode, label);
        }
        Action::UpdateTaskLabel {
            mode,
            task_id,
            label,
        } => update_task_label(draft, mode, &task_id, label),
        Action::RemoveTask { mode, task_id } => remove_task(draft, mode, &task_id),
        Action::ResetTasksForMode { mode } => reset_tasks_for_mode(draft, mode),
    }
}

// Absent payload keeps the current state.
pub fn hydrate(draft: &mut ChallengeState, payload: Option<StoredState>, now: DateTime<FixedOffset>) {
    if let Some(stored) = payload {
        *draft = schema::upgrade(stored, draft.mode, now);
    }
}

pub fn start_challenge(draft: &mut ChallengeState, mode: Option<Mode>, now: DateTime<FixedOffset>) {
    let mode = mode.unwrap_or(draft.mode);
    draft.mode = mode;
    draft.started_at = Some(now);
    draft.current_day = make_new_day(1, draft.definitions(mode), now);
}

pub fn toggle_task(draft: &mut ChallengeState, task_id: &str) {
    let done = draft
        .current_day
        .tasks
        .entry(task_id.to_string())
        .or_insert(false);
    *done = !*done;
}

pub fn set_reflection(draft: &mut ChallengeState, text: String) {
    draft.current_day.reflection = text;
}

pub fn next_day(draft: &mut ChallengeState, now: DateTime<FixedOffset>) {
    let day_number = draft.current_day.day_number.saturating_add(1);
    let next = make_new_day(day_number, draft.definitions(draft.mode), now);
    let finished = mem::replace(&mut draft.current_day, next);
    draft.history.push(finished);
}

// Restarts the run; history is kept.
pub fn reset_challenge(draft: &mut ChallengeState, now: DateTime<FixedOffset>) {
    draft.started_at = None;
    draft.current_day = make_new_day(1, draft.definitions(draft.mode), now);
}

// Mid-run the active day stays keyed to the previous mode's tasks.
pub fn set_mode(draft: &mut ChallengeState, mode: Mode, now: DateTime<FixedOffset>) {
    draft.mode = mode;
    if !draft.is_started() {
        draft.current_day = make_new_day(1, draft.definitions(mode), now);
    }
}

pub fn clear_history(draft: &mut ChallengeState) {
    draft.history.clear();
}

/// Append a task definition to `mode` and return its generated id.
pub fn add_task(draft: &mut ChallengeState, mode: Mode, label: String) -> String {
    let defs = draft.task_definitions.entry(mode).or_default();
    let id = generate_task_id(mode, defs);
    defs.push(TaskDefinition::new(id.clone(), label, mode));

    if mode == draft.mode {
        draft.current_day.tasks.insert(id.clone(), false);
    }
    id
}

pub fn update_task_label(draft: &mut ChallengeState, mode: Mode, task_id: &str, label: String) {
    if let Some(def) = draft
        .task_definitions
        .get_mut(&mode)
        .and_then(|defs| defs.iter_mut().find(|d| d.id == task_id))
    {
        def.label = label;
    }
}

pub fn remove_task(draft: &mut ChallengeState, mode: Mode, task_id: &str) {
    if let Some(defs) = draft.task_definitions.get_mut(&mode) {
        defs.retain(|d| d.id != task_id);
    }
    if mode == draft.mode {
        draft.current_day.tasks.remove(task_id);
    }
}

// Keeps day number and reflection of the active day.
pub fn reset_tasks_for_mode(draft: &mut ChallengeState, mode: Mode) {
    draft.task_definitions.insert(mode, default_definitions(mode));
    if mode == draft.mode {
        draft.current_day.tasks = fresh_tasks(draft.definitions(mode));
    }
}

fn generate_task_id(mode: Mode, existing: &[TaskDefinition]) -> String {
    loop {
        let id = format!("{}-{}", mode.slug(), Uuid::new_v4().simple());
        if !existing.iter().any(|d| d.id == id) {
            return id;
        }
    }
}
