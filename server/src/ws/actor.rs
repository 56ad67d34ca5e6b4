use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol::{self, ProtocolError};

/// Upper bound on flushing queued frames after the reader loop ends.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Run the actor-per-connection pattern for a WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Heartbeat task: pings periodically and finishes on a missed pong
/// - Reader loop: decodes JSON events and hands them to the hub, and stops
///   as soon as the heartbeat task finishes
///
/// The mpsc sender is what the hub stores, so presence broadcasts and routed
/// events reach this client without touching the socket directly.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = state.hub.connect(tx.clone());

    tracing::info!(connection_id = %connection_id, "WebSocket actor started");

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut ping_handle = tokio::spawn(heartbeat_task(
        tx.clone(),
        pong_rx,
        Duration::from_secs(state.realtime.ping_interval_secs.max(1)),
        Duration::from_secs(state.realtime.pong_timeout_secs.max(1)),
    ));

    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = &mut ping_handle => {
                // A silent peer never answers the close frame; clean up now.
                tracing::info!(connection_id = %connection_id, "Heartbeat lost, dropping connection");
                break;
            }
        };

        match frame {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &tx, &state, connection_id);
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Received binary frame, expected JSON text"
                    );
                    protocol::send_error(&tx, &ProtocolError::BinaryFrame);
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = %connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    ping_handle.abort();

    // Registry entry goes away with the socket; presence "offline" if it was current.
    let user_id = state.hub.disconnect(connection_id);

    // Last sender gone: the writer flushes what is queued (a 1001 close, say) and exits.
    drop(tx);
    if timeout(WRITER_DRAIN, &mut writer_handle).await.is_err() {
        writer_handle.abort();
    }

    tracing::info!(
        connection_id = %connection_id,
        user_id = ?user_id,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}

/// Ping every `ping_interval`; close with 1001 if no pong arrives within `pong_timeout`.
/// Returning ends the connection.
async fn heartbeat_task(
    tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let mut ping_timer = interval(ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        // Unsolicited pongs must not answer this ping.
        while pong_rx.try_recv().is_ok() {}

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}
