use rollcall_core::matcher::{DuplicatePolicy, MatchConfig, DEFAULT_THRESHOLD};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STORE_SECRET: &str = "insecure-dev-secret";

/// Service configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Secret the embedding-at-rest key is derived from.
    pub store_secret: String,
    /// Maximum embedding distance for a positive match.
    pub match_threshold: f32,
    /// Policy when two detected faces claim the same student.
    pub duplicate_policy: DuplicatePolicy,
    /// Bound on how long a caller waits for an analysis to finish.
    pub wait_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        Self {
            db_path,
            store_secret: std::env::var("ROLLCALL_STORE_SECRET")
                .unwrap_or_else(|_| DEFAULT_STORE_SECRET.to_string()),
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", DEFAULT_THRESHOLD),
            duplicate_policy: std::env::var("ROLLCALL_DUPLICATE_POLICY")
                .ok()
                .and_then(|v| parse_policy(&v))
                .unwrap_or(DuplicatePolicy::AcceptDuplicates),
            wait_timeout_secs: env_u64("ROLLCALL_WAIT_TIMEOUT_SECS", 30),
        }
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            threshold: self.match_threshold,
            duplicate_policy: self.duplicate_policy,
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

fn parse_policy(value: &str) -> Option<DuplicatePolicy> {
    match value.to_ascii_lowercase().as_str() {
        "accept" => Some(DuplicatePolicy::AcceptDuplicates),
        "reject" => Some(DuplicatePolicy::RejectDuplicates),
        _ => None,
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
