pub mod api;
pub mod router;
pub mod websocket;

use anyhow::Result;
use tokio::net::TcpListener;

use crate::app::AppContext;

/// Bind the configured port and serve until shutdown.
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr = format!("0.0.0.0:{}", ctx.server_port());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Notification server listening on http://{}", addr);
    serve(listener, ctx).await
}

/// Serve the router on an already-bound listener.
pub async fn serve(listener: TcpListener, ctx: AppContext) -> Result<()> {
    let shutdown_token = ctx.shutdown_token().clone();
    let app = router::create_router(ctx);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;

    Ok(())
}
