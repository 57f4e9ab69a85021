use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use palaver_shared::constants::MESSAGE_PAGE_SIZE;

use crate::error::ChatError;
use crate::models::{
    AuthSession, EditMessageRequest, ListMessagesQuery, PaginatedResponse, PostMessageRequest,
};
use crate::AppState;

/// GET /api/chats/:chatId/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<impl IntoResponse, ChatError> {
    let limit = query.count.unwrap_or(MESSAGE_PAGE_SIZE).max(1);
    let mut items = state
        .chat_service
        .list_messages(auth.user.id, &chat_id, query.before.as_deref(), Some(limit + 1))
        .await?;

    let has_more = items.len() as i64 > limit;
    if has_more {
        items.pop();
    }
    items.reverse(); // chronological order
    let cursor = items.first().map(|message| message.id.clone());

    Ok(Json(PaginatedResponse {
        items,
        cursor,
        has_more,
    }))
}

/// POST /api/chats/:chatId/messages
///
/// A repeated `localId` from the same author is a resend: the stored
/// message comes back with 200 and nothing is announced again.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(chat_id): Path<String>,
    Json(body): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (message, fanout) = state
        .chat_service
        .post_message(auth.user.id, &chat_id, body)
        .await?;
    let status = if fanout.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    if let Some(request) = fanout {
        state.notifier.dispatch(request);
    }
    Ok((status, Json(message)))
}

/// PATCH /api/messages/:messageId
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (message, fanout) = state
        .chat_service
        .edit_message(auth.user.id, &message_id, body)
        .await?;
    state.notifier.dispatch(fanout);
    Ok(Json(message))
}

/// DELETE /api/messages/:messageId
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let (message, fanout) = state
        .chat_service
        .delete_message(auth.user.id, &message_id)
        .await?;
    if let Some(request) = fanout {
        state.notifier.dispatch(request);
    }
    Ok(Json(message))
}

/// POST /api/messages/:messageId/read
pub async fn read_message(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let (message, fanout) = state
        .chat_service
        .read_message(auth.user.id, &message_id)
        .await?;
    if let Some(request) = fanout {
        state.notifier.dispatch(request);
    }
    Ok(Json(message))
}
