//! # emsu-server
//!
//! HTTP back end for the E.M.S.U school platform.
//!
//! This binary provides:
//! - **Role-scoped dashboards** for students, teachers, principals and
//!   proprietors
//! - **Chat and notifications**, with a notification raised for every
//!   direct chat message
//! - **Academic records** (grades, sessions, fees, announcements) behind a
//!   bearer-session REST API (axum) over a single SQLite store

mod access;
mod api;
mod config;
mod dashboard;
mod error;
mod extract;
mod fees;
mod messaging;
mod placeholders;
#[cfg(test)]
mod testutil;

use chrono::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use emsu_shared::constants::{APP_NAME, SESSION_TTL_HOURS};
use emsu_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,emsu_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store (runs migrations) and optionally seed it
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    if config.seed_demo {
        match db.seed_demo(Duration::hours(SESSION_TTL_HOURS))? {
            Some(seed) => {
                info!(school = %seed.school.name, "Seeded demo school");
                for (user, session) in &seed.logins {
                    info!(
                        email = %user.email,
                        role = %user.role,
                        token = %session.token,
                        "Demo login"
                    );
                }
            }
            None => info!("Database already populated, demo seed skipped"),
        }
    }

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
