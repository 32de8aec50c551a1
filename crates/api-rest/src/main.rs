//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API and dashboard sockets on their own.
//!
//! ## Intended use
//! Useful for development when you only want the HTTP surface. The workspace's main
//! `alinea-run` binary runs both gRPC and REST against one shared set of services.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alinea_core::config::{database_path_from_env_value, default_user_id_from_env_value};
use alinea_core::constants::DASHBOARD_REQUEST_PURPOSE;
use alinea_core::{CoreConfig, CoreServices, NonEmptyText};
use api_rest::{router, AppState};

/// Main entry point for the Alinea REST API server
///
/// # Environment Variables
/// - `ALINEA_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `ALINEA_DB_PATH`: SQLite database file (default: "alinea.db")
/// - `ALINEA_DEFAULT_USER_ID`: user targeted by requests that omit one (default: 1)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the database cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("alinea_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("ALINEA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::new(
        database_path_from_env_value(std::env::var("ALINEA_DB_PATH").ok()),
        default_user_id_from_env_value(std::env::var("ALINEA_DEFAULT_USER_ID").ok())?,
        NonEmptyText::new(DASHBOARD_REQUEST_PURPOSE)?,
    )?);
    let core = CoreServices::open(cfg)?;

    tracing::info!("-- Starting Alinea REST API on {}", addr);

    let app = router(AppState::new(core));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
