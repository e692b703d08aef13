//! Local event publishing.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::err_json;
use crate::app::AppContext;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// POST /api/events
///
/// Validates the raw event at the bus boundary; rejected events never
/// reach a subscriber.
pub async fn publish_event(
    State(ctx): State<AppContext>,
    Json(body): Json<PublishRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    ctx.bus()
        .publish_raw(&body.event_type, body.payload)
        .map_err(|e| err_json(StatusCode::BAD_REQUEST, &e.to_string()))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "unreadCount": ctx.store().unread_count() })),
    ))
}
