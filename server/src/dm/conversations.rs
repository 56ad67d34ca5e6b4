//! REST endpoints for direct conversation management.
//!
//! A direct conversation has exactly two distinct participants. Asking for
//! a conversation between the same pair twice returns the existing one.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::{ConversationRow, ConversationSummary};
use crate::db;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;
use crate::ws::UserId;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub user_id_1: Option<UserId>,
    pub user_id_2: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub message: String,
    #[serde(rename = "updatedCount")]
    pub updated_count: usize,
}

/// Return the direct conversation between `a` and `b`, creating it if needed.
/// The flag is true when a new conversation was created.
pub fn find_or_create_direct(
    conn: &Connection,
    a: UserId,
    b: UserId,
) -> Result<(bool, ConversationRow), ApiError> {
    let existing = conn
        .query_row(
            "SELECT c.id, c.type, c.created_at
             FROM conversations c
             JOIN conversation_participants p1 ON p1.conversation_id = c.id
             JOIN conversation_participants p2 ON p2.conversation_id = c.id
             WHERE c.type = 'direct' AND p1.user_id = ?1 AND p2.user_id = ?2
             LIMIT 1",
            params![a, b],
            |row| {
                Ok(ConversationRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;

    if let Some(row) = existing {
        return Ok((false, row));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute("INSERT INTO conversations (type) VALUES ('direct')", [])?;
    let id = tx.last_insert_rowid();
    tx.execute(
        "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2), (?1, ?3)",
        params![id, a, b],
    )?;
    let created_at: String = tx.query_row(
        "SELECT created_at FROM conversations WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    Ok((
        true,
        ConversationRow {
            id,
            kind: "direct".to_string(),
            created_at,
        },
    ))
}

pub fn is_participant(
    conn: &Connection,
    conversation_id: i64,
    user_id: UserId,
) -> Result<bool, ApiError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation_id, user_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Everyone in the conversation except `user_id`.
pub fn other_participants(
    conn: &Connection,
    conversation_id: i64,
    user_id: UserId,
) -> Result<Vec<UserId>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM conversation_participants
         WHERE conversation_id = ?1 AND user_id != ?2
         ORDER BY user_id",
    )?;
    let users = stmt
        .query_map(params![conversation_id, user_id], |row| row.get(0))?
        .collect::<Result<Vec<UserId>, _>>()?;
    Ok(users)
}

/// Conversations of `user_id`, most recently active first.
pub fn list_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<ConversationSummary>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.type, c.created_at, c.updated_at
         FROM conversations c
         JOIN conversation_participants p ON p.conversation_id = c.id
         WHERE p.user_id = ?1
         ORDER BY c.updated_at DESC, c.id DESC",
    )?;
    let conversations = stmt
        .query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for (id, kind, created_at, updated_at) in conversations {
        let participants = other_participants(conn, id, user_id)?;

        let last: Option<(String, String)> = conn
            .query_row(
                "SELECT content, created_at FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let unread_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND sender_id != ?2 AND read = 0",
            params![id, user_id],
            |row| row.get(0),
        )?;

        let (last_message, last_message_at) = match last {
            Some((content, at)) => (Some(content), Some(at)),
            None => (None, None),
        };

        summaries.push(ConversationSummary {
            id,
            kind,
            created_at,
            updated_at,
            participants,
            last_message,
            last_message_at,
            unread_count,
        });
    }

    Ok(summaries)
}

/// Mark every message from the other side as read. Returns rows changed.
pub fn mark_read(conn: &Connection, conversation_id: i64, user_id: UserId) -> Result<usize, ApiError> {
    let updated = conn.execute(
        "UPDATE messages SET read = 1
         WHERE conversation_id = ?1 AND sender_id != ?2 AND read = 0",
        params![conversation_id, user_id],
    )?;
    Ok(updated)
}

// --- REST endpoint handlers ---

/// POST /api/conversations: get or create the direct conversation between two users.
/// Body: { "user_id_1": 1, "user_id_2": 2 }. 201 when created, 200 when it existed.
pub async fn create_conversation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationRow>), ApiError> {
    let (Some(a), Some(b)) = (body.user_id_1, body.user_id_2) else {
        return Err(ApiError::bad_request("user_id_1 and user_id_2 are required"));
    };
    if a == b {
        return Err(ApiError::bad_request(
            "a direct conversation needs two different users",
        ));
    }

    let db = state.db.clone();
    let (created, row) = tokio::task::spawn_blocking(move || {
        let conn = db::lock(&db)?;
        find_or_create_direct(&conn, a, b)
    })
    .await??;

    if created {
        tracing::info!(conversation_id = row.id, user_a = a, user_b = b, "Conversation created");
        Ok((StatusCode::CREATED, Json(row)))
    } else {
        Ok((StatusCode::OK, Json(row)))
    }
}

/// GET /api/conversations/user/{user_id}: conversations with participants,
/// last message and unread count.
pub async fn list_conversations(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<UserId>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let db = state.db.clone();
    let conversations = tokio::task::spawn_blocking(move || {
        let conn = db::lock(&db)?;
        list_for_user(&conn, user_id)
    })
    .await??;

    Ok(Json(conversations))
}

/// PUT /api/conversations/{conversation_id}/read, body: { "user_id": 1 }.
pub async fn mark_as_read(
    State(state): State<AppState>,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiJson(body): ApiJson<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;

    let db = state.db.clone();
    let updated_count = tokio::task::spawn_blocking(move || {
        let conn = db::lock(&db)?;
        mark_read(&conn, conversation_id, user_id)
    })
    .await??;

    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        updated_count,
    }))
}
