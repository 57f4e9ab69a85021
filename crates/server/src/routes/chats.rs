use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ChatError;
use crate::models::{
    AuthSession, BlockUserRequest, ChatUsersRequest, CreateChatRequest, UpdateChatRequest,
    UpdateChatSettingsRequest, UserInfo,
};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearChatQuery {
    #[serde(default)]
    pub wipe_media: bool,
}

/// GET /api/chats
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<impl IntoResponse, ChatError> {
    let chats = state.chat_service.chats_of_user(auth.user.id).await?;
    Ok(Json(chats))
}

/// POST /api/chats
///
/// Creating a chat with a member set that already has one of the same
/// kind returns the existing chat (200 instead of 201).
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(body): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (chat, fanout) = state.chat_service.create_chat(auth.user.id, body).await?;
    let status = if fanout.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    if let Some(request) = fanout {
        state.notifier.dispatch(request);
    }
    Ok((status, Json(chat)))
}

/// GET /api/chats/:chatId
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let chat = state.chat_service.chat_for_user(auth.user.id, &chat_id).await?;
    Ok(Json(chat))
}

/// PATCH /api/chats/:chatId
pub async fn update_chat(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<UpdateChatRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (chat, fanout) = state
        .chat_service
        .update_chat(auth.user.id, &chat_id, &body.title)
        .await?;
    state.notifier.dispatch(fanout);
    Ok(Json(chat))
}

/// DELETE /api/chats/:chatId
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let fanout = state.chat_service.delete_chat(auth.user.id, &chat_id).await?;
    state.notifier.dispatch(fanout);
    Ok(Json(serde_json::json!({})))
}

/// PATCH /api/chats/:chatId/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<UpdateChatSettingsRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let relation = state
        .chat_service
        .update_settings(auth.user.id, &chat_id, body)
        .await?;
    Ok(Json(relation))
}

/// GET /api/chats/:chatId/users
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let members = state.chat_service.chat_members(auth.user.id, &chat_id).await?;
    Ok(Json(members))
}

/// POST /api/chats/:chatId/users
pub async fn add_users(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<ChatUsersRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (users, fanout) = state
        .chat_service
        .add_users(auth.user.id, &chat_id, body.user_ids)
        .await?;
    state.notifier.dispatch(fanout);
    let users: Vec<UserInfo> = users.iter().map(UserInfo::from).collect();
    Ok(Json(users))
}

/// DELETE /api/chats/:chatId/users
pub async fn remove_users(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<ChatUsersRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (removed, fanout) = state
        .chat_service
        .remove_users(auth.user.id, &chat_id, body.user_ids)
        .await?;
    state.notifier.dispatch(fanout);
    Ok(Json(serde_json::json!({ "userIds": removed })))
}

/// POST /api/chats/:chatId/block
pub async fn block_user(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<BlockUserRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let relation = state
        .chat_service
        .set_user_block(auth.user.id, &chat_id, body.user_id, true)
        .await?;
    Ok(Json(relation))
}

/// POST /api/chats/:chatId/unblock
pub async fn unblock_user(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<BlockUserRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let relation = state
        .chat_service
        .set_user_block(auth.user.id, &chat_id, body.user_id, false)
        .await?;
    Ok(Json(relation))
}

/// POST /api/chats/:chatId/exit
pub async fn exit_chat(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let fanout = state.chat_service.exit_chat(auth.user.id, &chat_id).await?;
    state.notifier.dispatch(fanout);
    Ok(Json(serde_json::json!({})))
}

/// POST /api/chats/:chatId/clear
pub async fn clear_chat(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Query(query): Query<ClearChatQuery>,
) -> Result<impl IntoResponse, ChatError> {
    let fanout = state
        .chat_service
        .clear_chat(auth.user.id, &chat_id, query.wipe_media)
        .await?;
    state.notifier.dispatch(fanout);
    Ok(Json(serde_json::json!({})))
}
