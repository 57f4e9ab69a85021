use serde::{Deserialize, Serialize};

/// Conversation row. Personal chats are untitled two-party conversations;
/// group chats carry a title and an owner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: Option<String>,
    pub is_personal: bool,
    /// Canonical membership fingerprint, see [`participants_key`].
    #[serde(skip_serializing)]
    pub participants_key: String,
    pub owner_id: i64,
    pub last_message_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Sorted member ids joined with '-'. Identical member sets always produce
/// the identical key, which is what chat-creation dedup matches on.
pub fn participants_key(user_ids: &[i64]) -> String {
    let mut ids: Vec<i64> = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Per-user membership state for one chat.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatRelation {
    pub chat_id: String,
    pub user_id: i64,
    pub is_muted: bool,
    pub is_archived: bool,
    pub is_user_blocked: bool,
    pub is_chat_blocked: bool,
    pub is_removed_on_device: bool,
    pub created_at: String,
}

impl ChatRelation {
    pub fn new(chat_id: &str, user_id: i64) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            user_id,
            is_muted: false,
            is_archived: false,
            is_user_blocked: false,
            is_chat_blocked: false,
            is_removed_on_device: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithRelation {
    #[serde(flatten)]
    pub chat: Chat,
    pub relation: ChatRelation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub participants: Vec<i64>,
    #[serde(default)]
    pub is_personal: bool,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChatRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChatSettingsRequest {
    pub is_muted: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_chat_blocked: Option<bool>,
    pub is_removed_on_device: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUsersRequest {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUserRequest {
    pub user_id: i64,
}
