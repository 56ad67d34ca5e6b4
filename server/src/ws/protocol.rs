use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::ws::{ConnectionId, ConnectionSender, UserId};

/// Events a client may send. Framed as `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    AnnounceIdentity(AnnounceIdentity),
    SendMessage(SendMessage),
    TypingStart(Typing),
    TypingStop(Typing),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceIdentity {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub target_user_id: UserId,
    pub conversation_id: i64,
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typing {
    pub target_user_id: UserId,
    pub conversation_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    PresenceChanged {
        user_id: UserId,
        status: PresenceStatus,
        timestamp: i64,
    },
    /// Users already online, sent to a connection right after it announces.
    PresenceSnapshot { online: Vec<UserId> },
    #[serde(rename_all = "camelCase")]
    MessageDelivered {
        conversation_id: i64,
        sender_id: UserId,
        message: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    TypingIndicator {
        conversation_id: i64,
        sender_id: UserId,
        is_typing: bool,
    },
    Error { code: u16, message: String },
}

impl ServerEvent {
    pub fn presence(user_id: UserId, status: PresenceStatus) -> Self {
        Self::PresenceChanged {
            user_id,
            status,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Wire name of the event, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PresenceChanged { .. } => "presence-changed",
            Self::PresenceSnapshot { .. } => "presence-snapshot",
            Self::MessageDelivered { .. } => "message-delivered",
            Self::TypingIndicator { .. } => "typing-indicator",
            Self::Error { .. } => "error",
        }
    }

    /// Encode as a WebSocket text frame.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        let text = serde_json::to_string(self)?;
        Ok(Message::Text(text.into()))
    }
}

/// Per-event failures. Each one is reported to the offending connection only.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("announce-identity required before {0}")]
    NotAnnounced(&'static str),

    #[error("binary frames are not supported, send JSON text")]
    BinaryFrame,
}

impl ProtocolError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Malformed(_) => 400,
            Self::NotAnnounced(_) => 401,
            Self::BinaryFrame => 415,
        }
    }
}

pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Handle an incoming text frame: decode, dispatch, report errors to the sender.
pub fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    connection_id: ConnectionId,
) {
    let result = decode(text).and_then(|event| dispatch(event, state, connection_id));

    if let Err(err) = result {
        tracing::warn!(
            connection_id = %connection_id,
            error = %err,
            "Rejected client event"
        );
        send_error(tx, &err);
    }
}

/// Route a decoded event to the hub.
fn dispatch(
    event: ClientEvent,
    state: &AppState,
    connection_id: ConnectionId,
) -> Result<(), ProtocolError> {
    match event {
        ClientEvent::AnnounceIdentity(AnnounceIdentity { user_id }) => {
            state.hub.announce(connection_id, user_id);
        }
        ClientEvent::SendMessage(msg) => {
            let sender_id = state
                .hub
                .identity_of(connection_id)
                .ok_or(ProtocolError::NotAnnounced("send-message"))?;
            state
                .hub
                .notify_message(msg.target_user_id, msg.conversation_id, sender_id, msg.message);
        }
        ClientEvent::TypingStart(typing) => {
            let sender_id = state
                .hub
                .identity_of(connection_id)
                .ok_or(ProtocolError::NotAnnounced("typing-start"))?;
            state
                .hub
                .notify_typing(typing.target_user_id, typing.conversation_id, sender_id, true);
        }
        ClientEvent::TypingStop(typing) => {
            let sender_id = state
                .hub
                .identity_of(connection_id)
                .ok_or(ProtocolError::NotAnnounced("typing-stop"))?;
            state
                .hub
                .notify_typing(typing.target_user_id, typing.conversation_id, sender_id, false);
        }
    }
    Ok(())
}

/// Send an error event back on the offending connection.
pub fn send_error(tx: &ConnectionSender, err: &ProtocolError) {
    let event = ServerEvent::Error {
        code: err.code(),
        message: err.to_string(),
    };
    if let Ok(msg) = event.to_message() {
        let _ = tx.send(msg);
    }
}
