//! Persisted snapshot layout and the forward upgrade applied on hydrate.
//!
//! Version 1 snapshots (no `schemaVersion` field) come from the fixed
//! checklist era: modes were called `STRICT` / `COACH`, there were no
//! editable task definitions and days could lack a reflection.
//! Every field is optional here so that any of those shapes still parses.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::logic;
use crate::models::{ChallengeState, DayState, Mode, TaskDefinition};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    pub schema_version: Option<u32>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub mode: Option<String>,
    pub task_definitions: Option<BTreeMap<String, Vec<StoredTaskDefinition>>>,
    pub current_day: Option<StoredDay>,
    pub history: Option<Vec<StoredDay>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTaskDefinition {
    pub id: String,
    pub label: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDay {
    pub day_number: Option<u32>,
    pub date: Option<DateTime<FixedOffset>>,
    pub tasks: Option<BTreeMap<String, bool>>,
    pub reflection: Option<String>,
}

/// What gets written to disk: the live state tagged with the schema version.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<'a> {
    pub schema_version: u32,
    #[serde(flatten)]
    pub state: &'a ChallengeState,
}

impl<'a> Snapshot<'a> {
    pub fn new(state: &'a ChallengeState) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            state,
        }
    }
}

/// Map a stored snapshot of any known version onto the current model.
///
/// `fallback_mode` is used when the snapshot has no usable mode.
/// The active day is re-keyed over the resolved mode's definitions; flags of
/// ids that still exist are carried over, everything else starts unchecked.
pub fn upgrade(
    stored: StoredState,
    fallback_mode: Mode,
    now: DateTime<FixedOffset>,
) -> ChallengeState {
    let version = stored.schema_version.unwrap_or(1);
    if version < CURRENT_SCHEMA_VERSION {
        debug!(from = version, to = CURRENT_SCHEMA_VERSION, "upgrading stored snapshot");
    } else if version > CURRENT_SCHEMA_VERSION {
        warn!(version, "snapshot written by a newer version, reading known fields only");
    }

    let mode = resolve_mode(stored.mode.as_deref(), fallback_mode);
    let task_definitions = resolve_definitions(stored.task_definitions);
    let defs = task_definitions
        .get(&mode)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let current_day = match stored.current_day {
        Some(day) => {
            let previous = day.tasks.unwrap_or_default();
            DayState {
                day_number: day.day_number.filter(|n| *n > 0).unwrap_or(1),
                date: day.date.unwrap_or(now),
                tasks: logic::carry_over_tasks(defs, &previous),
                reflection: day.reflection.unwrap_or_default(),
            }
        }
        None => logic::make_new_day(1, defs, now),
    };

    // Archived days are kept as recorded, only missing fields are filled.
    let history = stored
        .history
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, day)| DayState {
            day_number: day.day_number.filter(|n| *n > 0).unwrap_or(i as u32 + 1),
            date: day.date.unwrap_or(now),
            tasks: day.tasks.unwrap_or_default(),
            reflection: day.reflection.unwrap_or_default(),
        })
        .collect();

    ChallengeState {
        started_at: stored.started_at,
        mode,
        task_definitions,
        current_day,
        history,
    }
}

fn resolve_mode(raw: Option<&str>, fallback: Mode) -> Mode {
    match raw {
        None => fallback,
        Some(label) => label.parse().unwrap_or_else(|_| {
            warn!(mode = label, fallback = %fallback, "unknown mode in snapshot");
            fallback
        }),
    }
}

// An absent or empty table means defaults for every mode. A mode missing
// from a non-empty table gets its defaults; an explicitly empty list stays
// empty. Duplicate ids within one mode keep their first occurrence.
fn resolve_definitions(
    raw: Option<BTreeMap<String, Vec<StoredTaskDefinition>>>,
) -> BTreeMap<Mode, Vec<TaskDefinition>> {
    let raw = match raw {
        Some(table) if !table.is_empty() => table,
        _ => return logic::default_task_definitions(),
    };

    let mut resolved: BTreeMap<Mode, Vec<TaskDefinition>> = BTreeMap::new();
    for (key, entries) in raw {
        let Ok(mode) = key.parse::<Mode>() else {
            warn!(mode = %key, "dropping task definitions for unknown mode");
            continue;
        };
        if resolved.contains_key(&mode) {
            continue;
        }

        let mut defs: Vec<TaskDefinition> = Vec::with_capacity(entries.len());
        for entry in entries {
            if defs.iter().any(|d| d.id == entry.id) {
                continue;
            }
            let label = entry.label.unwrap_or_else(|| entry.id.clone());
            defs.push(TaskDefinition::new(entry.id, label, mode));
        }
        resolved.insert(mode, defs);
    }

    for mode in Mode::ALL {
        resolved
            .entry(mode)
            .or_insert_with(|| logic::default_definitions(mode));
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{default_definitions, fresh_tasks};

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-05-10T06:00:00+02:00").unwrap()
    }

    fn parse(json: &str) -> StoredState {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn legacy_strict_snapshot_is_upgraded() {
        let stored = parse(r#"{"mode":"STRICT","currentDay":{"dayNumber":5,"reflection":"ok"}}"#);
        let state = upgrade(stored, Mode::Soft, now());

        assert_eq!(state.mode, Mode::Hard);
        assert_eq!(state.task_definitions, logic::default_task_definitions());
        assert_eq!(state.current_day.day_number, 5);
        assert_eq!(state.current_day.reflection, "ok");
        assert_eq!(state.current_day.tasks, fresh_tasks(&default_definitions(Mode::Hard)));
        assert!(state.history.is_empty());
        assert!(state.started_at.is_none());
    }

    #[test]
    fn legacy_coach_maps_to_soft() {
        let state = upgrade(parse(r#"{"mode":"COACH"}"#), Mode::Hard, now());
        assert_eq!(state.mode, Mode::Soft);
        assert_eq!(state.current_day.day_number, 1);
        assert_eq!(state.current_day.tasks, fresh_tasks(&default_definitions(Mode::Soft)));
    }

    #[test]
    fn unknown_or_missing_mode_uses_fallback() {
        assert_eq!(upgrade(parse(r#"{"mode":"EXTREME"}"#), Mode::Soft, now()).mode, Mode::Soft);
        assert_eq!(upgrade(parse("{}"), Mode::Hard, now()).mode, Mode::Hard);
    }

    #[test]
    fn legacy_fixed_tasks_are_rekeyed() {
        // v1 kept a fixed map that included `no_alcohol`
        let stored = parse(
            r#"{
                "startedAt": "2026-05-01T06:00:00+02:00",
                "mode": "STRICT",
                "currentDay": {
                    "dayNumber": 3,
                    "date": "2026-05-03T06:00:00+02:00",
                    "tasks": {"workout1": true, "no_alcohol": true, "water": false},
                    "reflection": ""
                },
                "history": [
                    {"dayNumber": 1, "date": "2026-05-01T06:00:00+02:00", "tasks": {"no_alcohol": true}},
                    {"date": "2026-05-02T06:00:00+02:00", "tasks": {"water": true}, "reflection": "meh"}
                ]
            }"#,
        );
        let state = upgrade(stored, Mode::Hard, now());

        assert!(state.started_at.is_some());
        assert_eq!(state.current_day.tasks.len(), 6);
        assert_eq!(state.current_day.tasks["workout1"], true);
        assert!(!state.current_day.tasks.contains_key("no_alcohol"));

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].tasks["no_alcohol"], true);
        assert_eq!(state.history[0].reflection, "");
        assert_eq!(state.history[1].day_number, 2);
        assert_eq!(state.history[1].reflection, "meh");
    }

    #[test]
    fn custom_definitions_survive_and_missing_mode_gets_defaults() {
        let stored = parse(
            r#"{
                "schemaVersion": 2,
                "mode": "HARD",
                "taskDefinitions": {
                    "HARD": [
                        {"id": "a", "label": "Alpha", "mode": "HARD"},
                        {"id": "a", "label": "Duplicate", "mode": "HARD"},
                        {"id": "b"}
                    ]
                },
                "currentDay": {"dayNumber": 2, "tasks": {"a": true, "gone": true}}
            }"#,
        );
        let state = upgrade(stored, Mode::Hard, now());

        let hard = state.definitions(Mode::Hard);
        assert_eq!(hard.len(), 2);
        assert_eq!(hard[0].label, "Alpha");
        assert_eq!(hard[1].label, "b");
        assert_eq!(state.definitions(Mode::Soft), default_definitions(Mode::Soft).as_slice());

        assert_eq!(state.current_day.tasks.len(), 2);
        assert_eq!(state.current_day.tasks["a"], true);
        assert_eq!(state.current_day.tasks["b"], false);
    }

    #[test]
    fn empty_definition_table_means_defaults() {
        let state = upgrade(parse(r#"{"taskDefinitions":{}}"#), Mode::Hard, now());
        assert_eq!(state.task_definitions, logic::default_task_definitions());
    }

    #[test]
    fn snapshot_round_trips_through_upgrade() {
        let mut state = logic::default_state(now());
        logic::start_challenge(&mut state, Some(Mode::Soft), now());
        logic::add_task(&mut state, Mode::Soft, "Stretch".into());
        logic::toggle_task(&mut state, "water");
        logic::next_day(&mut state, now());
        logic::set_reflection(&mut state, "day two".into());

        let json = serde_json::to_string(&Snapshot::new(&state)).unwrap();
        assert!(json.contains("\"schemaVersion\":2"));

        let restored = upgrade(serde_json::from_str(&json).unwrap(), Mode::Hard, now());
        assert_eq!(restored, state);
    }
}
