use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::store::DEFAULT_STATE_PATH;

/// Runtime settings, from flags or environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "challenge-tracker", version, about = "Local-first 75 Hard style daily checklist")]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "CHALLENGE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// JSON file holding the persisted challenge state
    #[arg(long, env = "CHALLENGE_STATE_PATH", default_value = DEFAULT_STATE_PATH)]
    pub state_path: PathBuf,

    /// Directory with the static front end (HTML/CSS/JS)
    #[arg(long, env = "CHALLENGE_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "challenge-tracker",
            "--bind",
            "0.0.0.0:8080",
            "--state-path",
            "/tmp/state.json",
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn rejects_bad_address() {
        assert!(Config::try_parse_from(["challenge-tracker", "--bind", "nowhere"]).is_err());
    }
}
