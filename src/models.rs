use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// Written as HARD / SOFT; read through `FromStr` so every entry point
// accepts the same labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Mode {
    Hard,
    Soft,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Hard, Mode::Soft];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Hard => "HARD",
            Mode::Soft => "SOFT",
        }
    }

    // Prefix used when generating task ids
    pub fn slug(self) -> &'static str {
        match self {
            Mode::Hard => "hard",
            Mode::Soft => "soft",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    // Accepts the current labels plus the legacy STRICT / COACH names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HARD" | "STRICT" => Ok(Mode::Hard),
            "SOFT" | "COACH" => Ok(Mode::Soft),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDefinition {
    pub id: String,
    pub label: String,
    pub mode: Mode,
}

impl TaskDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, mode: Mode) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            mode,
        }
    }
}

/// One challenge day: the checklist snapshot plus reflection text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayState {
    pub day_number: u32,
    pub date: DateTime<FixedOffset>,
    pub tasks: BTreeMap<String, bool>, // task id -> completed
    pub reflection: String,
}

impl DayState {
    /// Share of completed tasks in percent. An empty checklist counts as 0.
    pub fn completion_percent(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let done = self.tasks.values().filter(|done| **done).count();
        done as f64 / self.tasks.len() as f64 * 100.0
    }

    pub fn completion_rounded(&self) -> u8 {
        self.completion_percent().round() as u8
    }
}

/// Aggregate root of the tracker.
///
/// `current_day.tasks` is keyed by the ids of `task_definitions[mode]`,
/// except after a mode switch mid-run (see `logic::set_mode`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeState {
    pub started_at: Option<DateTime<FixedOffset>>,
    pub mode: Mode,
    pub task_definitions: BTreeMap<Mode, Vec<TaskDefinition>>,
    pub current_day: DayState,
    pub history: Vec<DayState>,
}

impl ChallengeState {
    pub fn definitions(&self, mode: Mode) -> &[TaskDefinition] {
        self.task_definitions
            .get(&mode)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }
}
