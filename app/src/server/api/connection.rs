//! Push connectivity status.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::app::AppContext;
use crate::config::validation::check_feature_status;

/// GET /api/connection
pub async fn get_connection(State(ctx): State<AppContext>) -> Json<Value> {
    let push = ctx.push();
    Json(json!({
        "isConnected": ctx.monitor().is_connected(),
        "state": push.state(),
        "permission": push.permission(),
        "interests": push.get_device_interests(),
    }))
}

/// GET /api/settings/status
pub async fn get_feature_status(State(ctx): State<AppContext>) -> Json<Value> {
    Json(json!(check_feature_status(ctx.config())))
}
