//! Plant Server
//!
//! Serves a SQLite plant database over the JSON API used by `plantsync`
//! clients.
//!
//! # Configuration
//!
//! Uses the same config file and environment variables as the CLI:
//! - `PLANTSYNC_PORT`: Port to listen on (default: 8080)
//! - `PLANTSYNC_DATABASE_PATH`: SQLite database file
//! - `PLANTSYNC_API_KEY`: Require this bearer key on `/plants` routes
//! - `PLANTSYNC_CONFIG`: Path to config file

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plantsync::server::{router, AppState};
use plantsync::{init_db, Config, PlantRepository};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plantsync=info,plantsync_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("PLANTSYNC_CONFIG").ok().map(PathBuf::from);
    let config = Config::load(config_path)?;

    tracing::info!("Database: {}", config.database_path.value.display());
    if config.api_key.value.is_none() {
        tracing::warn!("No API key configured - plant routes are open");
    }

    let pool = init_db(&config.database_path.value).await?;
    let state = AppState::new(PlantRepository::new(pool), config.api_key.value.clone());
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port.value));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
