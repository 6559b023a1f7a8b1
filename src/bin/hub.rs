//! PetFeeder Hub
//!
//! Serves the feeder's live state tree over WebSocket and blob storage for
//! recordings and captures over HTTP. Feeder clients and the device
//! firmware both connect here.
//!
//! # Configuration
//!
//! Environment variables:
//! - `PETFEEDER_PORT`: Port to listen on (default: 8080)
//! - `PETFEEDER_DATA_DIR`: Directory for the persisted tree and blobs
//!   (default: ~/.local/share/petfeeder-hub)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (also the clients' connectivity probe)
//! - `GET /ws`: Live tree subscriptions and writes
//! - `PUT|GET|DELETE /blobs/{folder}/{name}`, `GET /blobs/{folder}`

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petfeeder::hub::{router, HubState};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Directory for the persisted tree and blob files
    data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("PETFEEDER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("PETFEEDER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("petfeeder-hub")
            });

        Self { port, data_dir }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petfeeder=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());

    let state = HubState::open(config.data_dir);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting hub on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
