use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::{fs, io};

use chrono::{DateTime, FixedOffset};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, info};

use crate::logic::{self, Action};
use crate::models::ChallengeState;
use crate::schema::{Snapshot, StoredState};

pub const DEFAULT_STATE_PATH: &str = "data/challengeState.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize challenge state: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read the saved snapshot. A missing file is not an error.
pub fn load_state(path: &Path) -> Result<Option<StoredState>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path)(e)),
    };
    let stored = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(stored))
}

/// Write the snapshot next to `path` first, then rename over it.
pub fn save_state(path: &Path, state: &ChallengeState) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(&Snapshot::new(state))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, text).map_err(io_error(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(io_error(path))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Build the startup state: defaults, hydrated from disk when possible.
/// Read failures are logged and leave the defaults in place.
pub fn bootstrap(path: &Path, now: DateTime<FixedOffset>) -> ChallengeState {
    let initial = logic::default_state(now);
    match load_state(path) {
        Ok(Some(stored)) => {
            let state = logic::apply(&initial, Action::Hydrate(Some(stored)), now);
            info!(
                path = %path.display(),
                mode = %state.mode,
                day = state.current_day.day_number,
                history = state.history.len(),
                "restored challenge state"
            );
            state
        }
        Ok(None) => {
            info!(path = %path.display(), "no saved state, starting fresh");
            initial
        }
        Err(e) => {
            error!(error = %e, "failed to load challenge state, starting fresh");
            initial
        }
    }
}

// On a multi-threaded runtime the file write moves off the async worker.
// Elsewhere (current-thread runtime, plain threads) it runs inline.
fn save_state_blocking(path: &Path, state: &ChallengeState) -> Result<(), StoreError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| save_state(path, state))
        }
        _ => save_state(path, state),
    }
}

/// Store listener that saves after every transition.
/// Write failures are logged; the in-memory state stays authoritative.
pub fn persist_on_change(path: PathBuf) -> impl Fn(&ChallengeState) + Send + Sync + 'static {
    move |state| {
        if let Err(e) = save_state_blocking(&path, state) {
            error!(error = %e, "failed to save challenge state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;
    use crate::state::ChallengeStore;
    use tempfile::TempDir;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-04-01T07:00:00+01:00").unwrap()
    }

    #[test]
    fn missing_file_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let loaded = load_state(&temp.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_tmp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data/challengeState.json");
        let state = logic::default_state(now());

        save_state(&path, &state).unwrap();

        assert!(path.exists());
        assert!(!tmp_path_for(&path).exists());
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["schemaVersion"], 2);
        assert_eq!(raw["mode"], "HARD");
    }

    #[test]
    fn corrupt_file_is_a_parse_error_and_bootstrap_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("challengeState.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_state(&path), Err(StoreError::Parse { .. })));
        assert_eq!(bootstrap(&path, now()), logic::default_state(now()));
    }

    #[test]
    fn bootstrap_hydrates_legacy_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("challengeState.json");
        fs::write(&path, r#"{"mode":"COACH","currentDay":{"dayNumber":9}}"#).unwrap();

        let state = bootstrap(&path, now());
        assert_eq!(state.mode, Mode::Soft);
        assert_eq!(state.current_day.day_number, 9);
        assert!(state.history.is_empty());
    }

    #[test]
    fn listener_persists_each_transition() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("challengeState.json");

        let mut store = ChallengeStore::new(bootstrap(&path, now()));
        store.subscribe(persist_on_change(path.clone()));
        store.dispatch_at(Action::start(Some(Mode::Soft)), now());
        store.dispatch_at(Action::ToggleTask { task_id: "reading".into() }, now());
        store.dispatch_at(Action::NextDay, now());

        let reloaded = bootstrap(&path, now());
        assert_eq!(&reloaded, store.state());
        assert_eq!(reloaded.history[0].tasks["reading"], true);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn listener_persists_from_runtime_worker() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("challengeState.json");

        let mut store = ChallengeStore::new(logic::default_state(now()));
        store.subscribe(persist_on_change(path.clone()));
        let shared = store.into_shared();

        shared
            .write()
            .await
            .dispatch_at(Action::SetReflection { text: "saved".into() }, now());

        let reloaded = bootstrap(&path, now());
        assert_eq!(reloaded.current_day.reflection, "saved");
    }

    #[tokio::test]
    async fn listener_persists_on_current_thread_runtime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("challengeState.json");

        let mut store = ChallengeStore::new(logic::default_state(now()));
        store.subscribe(persist_on_change(path.clone()));
        store.dispatch_at(Action::NextDay, now());

        assert_eq!(bootstrap(&path, now()).history.len(), 1);
    }

    #[test]
    fn failed_write_does_not_disturb_the_store() {
        let temp = TempDir::new().unwrap();
        // a directory where the file should go makes the rename fail
        let path = temp.path().join("taken");
        fs::create_dir_all(path.join("inner")).unwrap();

        let mut store = ChallengeStore::new(logic::default_state(now()));
        store.subscribe(persist_on_change(path));
        let state = store.dispatch_at(Action::SetReflection { text: "still here".into() }, now());
        assert_eq!(state.current_day.reflection, "still here");
    }
}
