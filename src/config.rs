// src/config.rs

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::error::AppError;

/// Namespace prefix of the resume-snapshot key. One slot per user.
pub const SNAPSHOT_NAMESPACE: &str = "test-progress";

/// Countdown tick period in seconds.
pub const TICK_SECONDS: u64 = 1;

pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// A driver with no commands for this long, and no running clock, shuts down.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. In-memory stores are used when absent.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// Directory backing the file key/value store for resume snapshots.
    pub snapshot_dir: PathBuf,
    pub snapshot_interval_secs: u64,
    pub leaderboard_size: usize,
    pub session_idle_secs: u64,
    /// JSON array of tests loaded into the in-memory catalog at startup.
    pub seed_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::InternalServerError("JWT_SECRET must be set".to_string()))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let snapshot_dir = env::var("SNAPSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/snapshots"));

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            snapshot_dir,
            snapshot_interval_secs: parse_or("SNAPSHOT_INTERVAL_SECS", DEFAULT_SNAPSHOT_INTERVAL_SECS)?,
            leaderboard_size: parse_or("LEADERBOARD_SIZE", DEFAULT_LEADERBOARD_SIZE)?,
            session_idle_secs: parse_or("SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS)?,
            seed_path: env::var("TEST_SEED_FILE").ok().map(PathBuf::from),
        })
    }

    /// Configuration for tests and local tooling: in-memory stores, default intervals.
    pub fn for_testing(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            snapshot_dir: env::temp_dir().join("testprep-snapshots"),
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            seed_path: None,
        }
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            AppError::InternalServerError(format!("Invalid value for {}: {}", name, e))
        }),
        Err(_) => Ok(default),
    }
}
