use std::time::Duration;

use tokio::time::sleep;

use crate::app::AppContext;

/// Stop serving, then tear the application context down.
pub async fn graceful_shutdown(ctx: &AppContext) {
    tracing::info!("Shutdown sequence started");

    ctx.shutdown().await;

    // Let the server drain in-flight responses.
    sleep(Duration::from_millis(200)).await;
    tracing::info!("Shutdown sequence completed");
}
