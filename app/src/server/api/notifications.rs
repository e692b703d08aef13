//! Notification list and read-state API.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::app::AppContext;

/// GET /api/notifications
pub async fn list(State(ctx): State<AppContext>) -> Json<Value> {
    Json(json!(ctx.store().snapshot()))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(State(ctx): State<AppContext>, Path(id): Path<String>) -> Json<Value> {
    ctx.store().mark_as_read(&id);
    Json(json!({ "status": "ok", "unreadCount": ctx.store().unread_count() }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(State(ctx): State<AppContext>) -> Json<Value> {
    ctx.store().mark_all_as_read();
    Json(json!({ "status": "ok", "unreadCount": ctx.store().unread_count() }))
}

/// DELETE /api/notifications/{id}
pub async fn remove(State(ctx): State<AppContext>, Path(id): Path<String>) -> Json<Value> {
    ctx.store().remove_notification(&id);
    Json(json!({ "status": "ok", "unreadCount": ctx.store().unread_count() }))
}

/// DELETE /api/notifications
pub async fn clear_all(State(ctx): State<AppContext>) -> Json<Value> {
    ctx.store().clear_all_notifications();
    Json(json!({ "status": "ok" }))
}
