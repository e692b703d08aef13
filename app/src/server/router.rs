use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use super::{api, websocket};
use crate::app::AppContext;

/// Create the axum router with all routes.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // --- Core ---
        .route("/status", get(status_handler))
        .route("/ws", get(websocket::ws_handler))
        // --- Notifications ---
        .route(
            "/api/notifications",
            get(api::notifications::list).delete(api::notifications::clear_all),
        )
        .route("/api/notifications/read-all", post(api::notifications::mark_all_read))
        .route("/api/notifications/{id}", delete(api::notifications::remove))
        .route("/api/notifications/{id}/read", post(api::notifications::mark_read))
        // --- Connection ---
        .route("/api/connection", get(api::connection::get_connection))
        .route("/api/settings/status", get(api::connection::get_feature_status))
        // --- Local events ---
        .route("/api/events", post(api::events::publish_event))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn status_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
