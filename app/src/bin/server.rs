//! Headless notification server.
//!
//! Starts the axum web server, connects the push client in the
//! background, and shuts everything down on Ctrl+C.

use busline_notify::app::AppContext;
use busline_notify::{server, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    busline_notify::init_tracing();
    tracing::info!("Starting busline notification server");

    let config = busline_notify::init_config();
    let ctx = AppContext::new(config);

    let server_ctx = ctx.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_ctx).await {
            tracing::error!("Server failed: {e}");
        }
    });

    let push_ctx = ctx.clone();
    tokio::spawn(async move { push_ctx.connect_push().await });

    tracing::info!(
        port = ctx.server_port(),
        "Server running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&ctx).await;
    server_handle.abort();
    Ok(())
}
