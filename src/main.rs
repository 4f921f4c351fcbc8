// Define data modules
mod config; // Command-line / environment settings
mod models; // Data structures (Mode, TaskDefinition, DayState, ChallengeState)
mod schema; // Persisted snapshot layout and legacy upgrade
mod logic;  // Challenge state transitions
mod state;  // State container with change listeners
mod store;  // Persistent storage (load/save challengeState.json)
mod routes_challenge;   // HTTP handlers for the running challenge
mod routes_tasks;       // HTTP handlers for task definitions

use std::path::Path;

use anyhow::Context;
// Import axum routing utilities and Router
use axum::{
    routing::{get, post, put}, // HTTP method helpers
    Router, // Main router type
};
use clap::Parser;
use tower_http::services::ServeDir; // Used to serve static files (HTML/CSS/JS)
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::{ChallengeStore, SharedStore};

fn build_router(store: SharedStore, static_dir: &Path) -> Router {
    let api = Router::new()
        // state
        .route("/state", get(routes_challenge::get_state))
        .route("/actions", post(routes_challenge::apply_action))
        // challenge
        .route("/challenge/start", post(routes_challenge::start_challenge))
        .route("/challenge/toggle/:task_id", post(routes_challenge::toggle_task))
        .route("/challenge/reflection", put(routes_challenge::set_reflection))
        .route("/challenge/next-day", post(routes_challenge::next_day))
        .route("/challenge/reset", post(routes_challenge::reset_challenge))
        .route("/challenge/mode", put(routes_challenge::set_mode))
        // history
        .route(
            "/history",
            get(routes_challenge::get_history).delete(routes_challenge::clear_history),
        )
        // task definitions
        .route("/tasks/:mode", get(routes_tasks::list_tasks).post(routes_tasks::create_task))
        .route(
            "/tasks/:mode/:id",
            put(routes_tasks::update_task).delete(routes_tasks::delete_task),
        )
        .route("/reset-tasks/:mode", post(routes_tasks::reset_tasks))
        // snapshots
        .route("/export", get(routes_challenge::export_snapshot))
        .route("/import", post(routes_challenge::import_snapshot))
        .with_state(store);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    // Hydrate once at startup, then save after every transition
    let initial = store::bootstrap(&config.state_path, logic::now_fixed_offset());
    let mut challenge = ChallengeStore::new(initial);
    challenge.subscribe(store::persist_on_change(config.state_path.clone()));

    let app = build_router(challenge.into_shared(), &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!(
        addr = %config.bind,
        state_path = %config.state_path.display(),
        static_dir = %config.static_dir.display(),
        "server running"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
