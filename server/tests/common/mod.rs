//! Shared helpers: spin up the real router on a random port and talk to it
//! over WebSocket / HTTP.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use hauzflow_server::config::RealtimeConfig;

/// Start the server on a random port and return (base_url, addr).
pub async fn start_test_server(presence_snapshot: bool) -> (String, SocketAddr) {
    start_test_server_with(RealtimeConfig {
        presence_snapshot,
        ..RealtimeConfig::default()
    })
    .await
}

pub async fn start_test_server_with(realtime: RealtimeConfig) -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = hauzflow_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = hauzflow_server::state::AppState::new(db, realtime, "test".to_string());

    let app = hauzflow_server::routes::build_router(state, &["http://localhost:5173".to_string()]);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        // Keep tmp_dir alive so the data directory isn't deleted
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr)
}

pub struct WsClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Connect and wait until the server-side actor is registered
    /// (its reader loop answers our ping).
    pub async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .expect("Failed to connect to WebSocket");
        let mut client = Self { ws };
        client.round_trip().await;
        client
    }

    /// Ping and wait for the matching pong. Text frames seen on the way are dropped.
    pub async fn round_trip(&mut self) {
        self.ws
            .send(Message::Ping(vec![9, 9].into()))
            .await
            .expect("Failed to send ping");
        loop {
            match tokio::time::timeout(Duration::from_secs(2), self.ws.next()).await {
                Ok(Some(Ok(Message::Pong(data)))) if data.as_ref() == [9, 9] => return,
                Ok(Some(Ok(_))) => continue,
                other => panic!("Expected pong, got: {:?}", other),
            }
        }
    }

    pub async fn send_event(&mut self, event: Value) {
        self.ws
            .send(Message::Text(event.to_string().into()))
            .await
            .expect("Failed to send event");
    }

    pub async fn send_raw(&mut self, msg: Message) {
        self.ws.send(msg).await.expect("Failed to send frame");
    }

    pub async fn announce(&mut self, user_id: i64) {
        self.send_event(serde_json::json!({
            "event": "announce-identity",
            "data": {"userId": user_id}
        }))
        .await;
    }

    /// Next JSON event within `wait`, skipping control frames.
    pub async fn next_event_within(&mut self, wait: Duration) -> Option<Value> {
        loop {
            match tokio::time::timeout(wait, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return Some(serde_json::from_str(text.as_str()).expect("Server sent invalid JSON"));
                }
                Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
                _ => return None,
            }
        }
    }

    pub async fn next_event(&mut self) -> Value {
        self.next_event_within(Duration::from_secs(2))
            .await
            .expect("Expected an event within timeout")
    }

    /// Wait for the next event with the given name, skipping others.
    pub async fn expect_event(&mut self, name: &str) -> Value {
        loop {
            let event = self.next_event().await;
            if event["event"] == name {
                return event;
            }
        }
    }

    pub async fn expect_silence(&mut self) {
        let event = self.next_event_within(Duration::from_millis(300)).await;
        assert!(event.is_none(), "Expected no event, got: {:?}", event);
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    pub async fn send_ping(&mut self, payload: Vec<u8>) {
        self.ws
            .send(Message::Ping(payload.into()))
            .await
            .expect("Failed to send ping");
    }

    pub async fn next_frame(&mut self) -> Option<Message> {
        match tokio::time::timeout(Duration::from_secs(2), self.ws.next()).await {
            Ok(Some(Ok(msg))) => Some(msg),
            _ => None,
        }
    }
}
