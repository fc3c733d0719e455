//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use emsu_shared::constants::DEFAULT_HTTP_PORT;
use emsu_shared::Term;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./emsu.db`
    pub database_path: PathBuf,

    /// Fill empty dashboard feeds (grades, announcements, schedule,
    /// activities) with sample records.
    /// Env: `PLACEHOLDER_BACKFILL` (true/false)
    /// Default: `true`
    pub placeholder_backfill: bool,

    /// Term whose grades appear on the student dashboard.
    /// Env: `ACTIVE_TERM` (first/second/third)
    /// Default: `first`
    pub active_term: Term,

    /// Origins allowed by CORS. Empty means any origin.
    /// Env: `CORS_ORIGINS` (comma-separated)
    pub cors_origins: Vec<String>,

    /// Seed a demo school when the database has no users.
    /// Env: `SEED_DEMO` (true/false)
    /// Default: `false`
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./emsu.db"),
            placeholder_backfill: true,
            active_term: Term::First,
            cors_origins: Vec::new(),
            seed_demo: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(val) = lookup("PLACEHOLDER_BACKFILL") {
            config.placeholder_backfill = val != "false" && val != "0";
        }

        if let Some(val) = lookup("ACTIVE_TERM") {
            match val.trim().to_lowercase().parse::<Term>() {
                Ok(term) => config.active_term = term,
                Err(e) => tracing::warn!(error = %e, "Invalid ACTIVE_TERM, using default"),
            }
        }

        if let Some(val) = lookup("CORS_ORIGINS") {
            config.cors_origins = val
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty() && *origin != "*")
                .map(String::from)
                .collect();
        }

        if let Some(val) = lookup("SEED_DEMO") {
            config.seed_demo = val == "true" || val == "1";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
