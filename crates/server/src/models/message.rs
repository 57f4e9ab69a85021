use serde::{Deserialize, Serialize};

/// Read receipt badge recorded when a recipient marks a message seen.
pub const READ_BADGE: &str = "seen";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Client-generated id for send retries. Unique per (chat, author).
    pub local_id: Option<String>,
    pub chat_id: String,
    pub author_id: i64,
    pub text: Option<String>,
    pub file_type: Option<String>,
    pub file_size: i64,
    pub preview_width: Option<i64>,
    pub preview_height: Option<i64>,
    pub is_visible: bool,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub read_at: Option<String>,
}

impl Message {
    /// Deleted messages keep their row and ordering position; empty text
    /// marks the tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.text.as_deref() == Some("")
    }

    pub fn has_attachment(&self) -> bool {
        self.file_type.as_deref().is_some_and(|t| !t.is_empty()) && self.file_size > 0
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReadMark {
    pub id: String,
    pub message_id: String,
    pub user_id: i64,
    pub badge: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MediaResource {
    pub id: String,
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
    pub path: String,
    pub file_type: String,
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub text: Option<String>,
    pub local_id: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub preview_width: Option<i64>,
    pub preview_height: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub text: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    pub before: Option<String>,
    pub count: Option<i64>,
}
