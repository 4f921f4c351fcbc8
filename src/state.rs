use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::sync::RwLock;
use tracing::debug;

use crate::logic::{self, Action};
use crate::models::ChallengeState;

pub type Listener = Box<dyn Fn(&ChallengeState) + Send + Sync>;

/// Store handle shared across request handlers.
/// The write lock is the single writer; a transition runs to completion
/// (listeners included) before the next one can start.
pub type SharedStore = Arc<RwLock<ChallengeStore>>;

/// Owns the tracker state and runs transitions against it.
pub struct ChallengeStore {
    state: ChallengeState,
    listeners: Vec<Listener>,
}

impl ChallengeStore {
    pub fn new(initial: ChallengeState) -> Self {
        Self {
            state: initial,
            listeners: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn state(&self) -> &ChallengeState {
        &self.state
    }

    /// Register a listener called with the new state after every transition.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&ChallengeState) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn dispatch(&mut self, action: Action) -> &ChallengeState {
        self.dispatch_at(action, logic::now_fixed_offset())
    }

    pub fn dispatch_at(&mut self, action: Action, now: DateTime<FixedOffset>) -> &ChallengeState {
        let name = action.name();
        self.state = logic::apply(&self.state, action, now);
        debug!(
            action = name,
            mode = %self.state.mode,
            day = self.state.current_day.day_number,
            history = self.state.history.len(),
            "transition applied"
        );

        for listener in &self.listeners {
            listener(&self.state);
        }
        &self.state
    }
}
