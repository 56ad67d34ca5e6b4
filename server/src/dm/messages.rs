//! REST endpoints for sending and reading direct messages.
//!
//! Messages are persisted first; real-time delivery to the other participants
//! goes through the hub afterwards and never affects the HTTP outcome.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::db::models::MessageRow;
use crate::dm::conversations::{is_participant, other_participants};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use crate::ws::UserId;

/// Default page size for message history.
const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for message history.
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: Option<i64>,
    pub sender_id: Option<UserId>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: String,
    #[serde(rename = "messageId")]
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Persist a message from a participant and bump the conversation.
/// Returns the stored row and the users who should be notified.
pub fn insert_message(
    conn: &Connection,
    conversation_id: i64,
    sender_id: UserId,
    content: &str,
) -> Result<(MessageRow, Vec<UserId>), ApiError> {
    if !is_participant(conn, conversation_id, sender_id)? {
        return Err(ApiError::Forbidden(
            "sender is not a participant of this conversation".to_string(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO messages (conversation_id, sender_id, content) VALUES (?1, ?2, ?3)",
        params![conversation_id, sender_id, content],
    )?;
    let id = tx.last_insert_rowid();
    tx.execute(
        "UPDATE conversations SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
        params![conversation_id],
    )?;
    let row = tx.query_row(
        "SELECT id, conversation_id, sender_id, content, read, created_at FROM messages WHERE id = ?1",
        params![id],
        row_to_message,
    )?;
    tx.commit()?;

    let recipients = other_participants(conn, conversation_id, sender_id)?;
    Ok((row, recipients))
}

/// One page of history, oldest first. `offset` counts back from the newest message.
pub fn history(
    conn: &Connection,
    conversation_id: i64,
    user_id: UserId,
    limit: u32,
    offset: u32,
) -> Result<Vec<MessageRow>, ApiError> {
    if !is_participant(conn, conversation_id, user_id)? {
        return Err(ApiError::Forbidden(
            "user is not a participant of this conversation".to_string(),
        ));
    }

    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, content, read, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let mut messages = stmt
        .query_map(params![conversation_id, limit, offset], row_to_message)?
        .collect::<Result<Vec<_>, _>>()?;
    messages.reverse();
    Ok(messages)
}

// --- REST endpoint handlers ---

/// POST /api/messages, body: { "conversation_id", "sender_id", "content" }.
/// Persists the message, then pushes `message-delivered` to online recipients.
pub async fn send_message(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let (Some(conversation_id), Some(sender_id), Some(content)) =
        (body.conversation_id, body.sender_id, body.content)
    else {
        return Err(ApiError::bad_request(
            "conversation_id, sender_id and content are required",
        ));
    };
    if content.trim().is_empty() {
        return Err(ApiError::bad_request("content must not be empty"));
    }

    let db = state.db.clone();
    let (row, recipients) = tokio::task::spawn_blocking(move || {
        let conn = db::lock(&db)?;
        insert_message(&conn, conversation_id, sender_id, &content)
    })
    .await??;

    match serde_json::to_value(&row) {
        Ok(payload) => {
            for recipient in &recipients {
                state
                    .hub
                    .notify_message(*recipient, conversation_id, sender_id, payload.clone());
            }
        }
        Err(e) => tracing::warn!(message_id = row.id, error = %e, "Failed to encode delivery payload"),
    }

    tracing::debug!(
        message_id = row.id,
        conversation_id,
        sender_id,
        recipients = recipients.len(),
        "Message stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent".to_string(),
            message_id: row.id,
        }),
    ))
}

/// GET /api/conversations/{conversation_id}/messages?user_id=&limit=&offset=
pub async fn get_messages(
    State(state): State<AppState>,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let db = state.db.clone();
    let messages = tokio::task::spawn_blocking(move || {
        let conn = db::lock(&db)?;
        history(&conn, conversation_id, user_id, limit, offset)
    })
    .await??;

    Ok(Json(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::dm::conversations::{find_or_create_direct, list_for_user};

    #[test]
    fn test_insert_returns_recipients() {
        let conn = open_in_memory();
        let (_, conv) = find_or_create_direct(&conn, 1, 2).unwrap();

        let (row, recipients) = insert_message(&conn, conv.id, 1, "olá").unwrap();
        assert_eq!(row.content, "olá");
        assert_eq!(row.sender_id, 1);
        assert!(!row.read);
        assert_eq!(recipients, vec![2]);
    }

    #[test]
    fn test_outsider_cannot_send() {
        let conn = open_in_memory();
        let (_, conv) = find_or_create_direct(&conn, 1, 2).unwrap();

        let err = insert_message(&conn, conv.id, 3, "hi").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_send_bumps_conversation_order() {
        let conn = open_in_memory();
        let (_, older) = find_or_create_direct(&conn, 1, 2).unwrap();
        let (_, newer) = find_or_create_direct(&conn, 1, 3).unwrap();
        assert_eq!(list_for_user(&conn, 1).unwrap()[0].id, newer.id);

        // Timestamps have millisecond resolution.
        std::thread::sleep(std::time::Duration::from_millis(5));
        insert_message(&conn, older.id, 2, "bump").unwrap();
        assert_eq!(list_for_user(&conn, 1).unwrap()[0].id, older.id);
    }

    #[test]
    fn test_history_pages_oldest_first() {
        let conn = open_in_memory();
        let (_, conv) = find_or_create_direct(&conn, 1, 2).unwrap();
        for i in 0..5 {
            insert_message(&conn, conv.id, 1 + (i % 2), &format!("m{}", i)).unwrap();
        }

        let latest: Vec<String> = history(&conn, conv.id, 2, 2, 0)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(latest, vec!["m3", "m4"]);

        let earlier: Vec<String> = history(&conn, conv.id, 2, 2, 2)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(earlier, vec!["m1", "m2"]);
    }

    #[test]
    fn test_history_requires_participant() {
        let conn = open_in_memory();
        let (_, conv) = find_or_create_direct(&conn, 1, 2).unwrap();
        assert!(matches!(
            history(&conn, conv.id, 9, 10, 0),
            Err(ApiError::Forbidden(_))
        ));
    }
}
