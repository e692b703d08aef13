use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;

use super::*;

impl AgentClient {
    /// Run one connection until it closes.
    ///
    /// `Ok(Some(url))` asks the caller to reconnect to `url`,
    /// `Ok(None)` means shutdown, `Err` triggers backoff.
    pub(super) async fn connect_once(
        config: &AgentConfig,
        ws_url: &str,
        sink: &mpsc::Sender<String>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<Option<String>, PushError> {
        use tokio_tungstenite::tungstenite::Message as Msg;

        tracing::info!(ws_url = %ws_url, "Connecting push agent");
        let (mut ws, _) = match connect_async(ws_url).await {
            Ok(pair) => pair,
            Err(WsError::Http(resp)) => {
                return Err(PushError::Api {
                    status: resp.status().as_u16(),
                    message: "relay rejected the handshake".into(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!("Push agent connected");

        let timeout = config.keepalive_timeout * 2;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Push agent shutdown during listen");
                    let _ = ws.close(None).await;
                    return Ok(None);
                }
                result = tokio::time::timeout(timeout, ws.next()) => {
                    match result {
                        Ok(Some(Ok(Msg::Text(text)))) => {
                            match FrameAction::classify(text.as_str())? {
                                FrameAction::Forward => {
                                    if sink.send(text.as_str().to_owned()).await.is_err() {
                                        tracing::info!("Push agent sink dropped during listen");
                                        let _ = ws.close(None).await;
                                        return Ok(None);
                                    }
                                }
                                FrameAction::Skip => {
                                    tracing::trace!("Push agent keepalive received");
                                }
                                FrameAction::Reconnect(next_url) => {
                                    let _ = ws.close(None).await;
                                    return Ok(Some(next_url));
                                }
                            }
                        }
                        Ok(Some(Ok(Msg::Ping(data)))) => {
                            let _ = ws.send(Msg::Pong(data)).await;
                        }
                        Ok(Some(Ok(Msg::Close(_)))) | Ok(None) => {
                            tracing::warn!("Push relay closed the connection");
                            return Err(PushError::Agent("relay closed".into()));
                        }
                        Ok(Some(Err(e))) => return Err(PushError::WebSocket(e)),
                        Ok(Some(Ok(_))) => {}
                        Err(_) => {
                            tracing::warn!("Push agent keepalive timeout");
                            return Err(PushError::Timeout);
                        }
                    }
                }
            }
        }
    }
}
