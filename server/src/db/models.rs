//! Row types returned by the messaging endpoints.
//! These correspond to the SQLite schema defined in migrations.rs.

use serde::Serialize;

use crate::ws::UserId;

/// Conversation record in the conversations table
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRow {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
}

/// Conversation as listed for one user, with the other side and unread count
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    pub updated_at: String,
    pub participants: Vec<UserId>,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
}

/// Message record in the messages table
#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: UserId,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}
