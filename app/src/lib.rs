//! Real-time notification service for the bus-booking portals.
//!
//! Wires the push client, the local event bus and the notification store
//! into one [`app::AppContext`], and exposes it to UI widgets over HTTP
//! and WebSocket.

pub mod app;
pub mod bridge;
pub mod config;
pub mod monitor;
pub mod server;
pub mod shutdown;

use tracing_subscriber::EnvFilter;

use config::AppConfig;
use config::validation::check_feature_status;

/// Install the global tracing subscriber (`RUST_LOG` controls filtering).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Load environment and configuration, logging anything missing.
pub fn init_config() -> AppConfig {
    load_dotenv();
    let config = AppConfig::load();

    let status = check_feature_status(&config);
    if !status.missing_settings.is_empty() || !status.warnings.is_empty() {
        tracing::warn!(
            "Missing settings: {:?}, warnings: {:?}",
            status.missing_settings,
            status.warnings
        );
    }

    tracing::info!("Settings loaded (port={})", config.server_port);
    config
}
