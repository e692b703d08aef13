use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use crate::app::AppContext;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = ctx.subscribe_ws();

    let client_id = uuid::Uuid::new_v4().to_string();
    let greeting = [
        json!({ "type": "connected", "data": { "clientId": client_id } }),
        json!({ "type": "notifications", "data": ctx.store().snapshot() }),
        json!({ "type": "connection", "data": { "isConnected": ctx.monitor().is_connected() } }),
    ];
    for msg in greeting {
        if sender
            .send(Message::Text(msg.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    tracing::info!("WebSocket client connected: {}", client_id);

    // Replies addressed to this client only
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(16);

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "WebSocket client lagging, skipping stale updates");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = reply_rx.recv() => reply,
            };
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let cid = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Some(reply) = handle_client_message(&text) {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        tracing::info!("WebSocket client disconnected: {}", cid);
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Reply to a client message, if it warrants one.
fn handle_client_message(text: &str) -> Option<String> {
    let msg = serde_json::from_str::<serde_json::Value>(text).ok()?;
    match msg.get("type").and_then(|t| t.as_str()) {
        Some("ping") => Some(json!({ "type": "pong" }).to_string()),
        _ => None,
    }
}
