use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use busline_notify::app::AppContext;
use busline_notify::config::AppConfig;
use busline_notify::server;
use notification_core::{NotificationSpec, NotificationType};
use serde_json::{Value, json};

async fn spawn_server(config: AppConfig) -> (AppContext, SocketAddr) {
    let ctx = AppContext::new(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_ctx = ctx.clone();
    tokio::spawn(async move { server::serve(listener, server_ctx).await.unwrap() });
    (ctx, addr)
}

fn local_only() -> AppConfig {
    AppConfig {
        notification_auto_hide: false,
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn local_event_round_trip() {
    let (ctx, addr) = spawn_server(local_only()).await;
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();

    let status: Value = http
        .get(format!("{base}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "ok");

    let resp = http
        .post(format!("{base}/api/events"))
        .json(&json!({
            "eventType": "bus.created",
            "payload": { "busName": "Express-1", "route": "A-B", "adminName": "Admin" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);

    let snap: Value = http
        .get(format!("{base}/api/notifications"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snap["unreadCount"], 1);
    let n = &snap["notifications"][0];
    assert_eq!(n["type"], "success");
    assert_eq!(n["title"], "Bus Added");
    assert!(n["message"].as_str().unwrap().contains("Express-1"));

    let id = n["id"].as_str().unwrap().to_string();
    let read: Value = http
        .post(format!("{base}/api/notifications/{id}/read"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["unreadCount"], 0);

    http.delete(format!("{base}/api/notifications/{id}"))
        .send()
        .await
        .unwrap();
    assert!(ctx.store().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn rejected_event_returns_bad_request() {
    let (ctx, addr) = spawn_server(local_only()).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("http://{addr}/api/events"))
        .json(&json!({ "eventType": "admin.login", "payload": { "adminName": "Ana" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("email"));

    let resp = http
        .post(format!("http://{addr}/api/events"))
        .json(&json!({ "eventType": "bus.exploded", "payload": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(ctx.store().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn unsupported_platform_degrades_to_local_events() {
    // No agent URL: the platform has no background messaging.
    let (ctx, addr) = spawn_server(local_only()).await;
    ctx.connect_push().await;

    let conn: Value = reqwest::get(format!("http://{addr}/api/connection"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conn["isConnected"], false);
    assert_eq!(conn["state"], "failed");
    assert_eq!(conn["interests"], json!([]));

    ctx.bus()
        .publish_raw("system.info", json!({ "title": "Maintenance", "message": "Tonight" }))
        .unwrap();
    assert_eq!(ctx.store().len(), 1);

    ctx.shutdown().await;
}

#[tokio::test]
async fn read_all_and_clear() {
    let (ctx, addr) = spawn_server(local_only()).await;
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();

    for name in ["Ana", "Bo", "Cy"] {
        ctx.bus()
            .publish_raw("admin.logout", json!({ "adminName": name }))
            .unwrap();
    }
    assert_eq!(ctx.store().unread_count(), 3);

    http.post(format!("{base}/api/notifications/read-all"))
        .send()
        .await
        .unwrap();
    assert_eq!(ctx.store().unread_count(), 0);

    http.delete(format!("{base}/api/notifications"))
        .send()
        .await
        .unwrap();
    assert!(ctx.store().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn read_all_reports_unread_left_by_concurrent_insert() {
    let (ctx, addr) = spawn_server(local_only()).await;
    ctx.bus()
        .publish_raw("admin.logout", json!({ "adminName": "Ana" }))
        .unwrap();

    // Inserts one more notification the first time everything reads as seen.
    let store = ctx.store().clone();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    let _sub = ctx.store().subscribe(move |snap| {
        if snap.unread_count == 0
            && !snap.notifications.is_empty()
            && !flag.swap(true, Ordering::SeqCst)
        {
            let late = NotificationSpec::new(NotificationType::Info, "Late", "arrived");
            store.show_notification(late).unwrap();
        }
    });

    let body: Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/notifications/read-all"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(body["unreadCount"], 1);
    assert_eq!(ctx.store().unread_count(), 1);

    ctx.shutdown().await;
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures::Stream<
            Item = Result<
                tokio_tungstenite::tungstenite::Message,
                tokio_tungstenite::tungstenite::Error,
            >,
        > + Unpin,
{
    use futures::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    loop {
        if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn websocket_streams_store_updates() {
    let (ctx, addr) = spawn_server(local_only()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    assert_eq!(next_json(&mut ws).await["type"], "connected");
    let initial = next_json(&mut ws).await;
    assert_eq!(initial["type"], "notifications");
    assert_eq!(initial["data"]["unreadCount"], 0);
    assert_eq!(next_json(&mut ws).await["type"], "connection");

    ctx.bus()
        .publish_raw("admin.logout", json!({ "adminName": "Ana" }))
        .unwrap();
    let update = next_json(&mut ws).await;
    assert_eq!(update["type"], "notifications");
    assert_eq!(update["data"]["notifications"][0]["message"], "Ana signed out.");

    ctx.shutdown().await;
}
