use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use palaver_shared::validation::{validate_display_name, validate_password};

use crate::error::ChatError;
use crate::models::{AuthSession, UpdateProfileRequest, UserInfo};
use crate::AppState;

/// GET /api/users/me
pub async fn get_me(auth: AuthSession) -> Result<impl IntoResponse, ChatError> {
    Ok(Json(UserInfo::from(&auth.user)))
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let mut user = auth.user;
    let mut profile_changed = false;
    let mut has_updates = false;

    if let Some(display_name) = body.display_name.as_deref() {
        let display_name = display_name.trim();
        validate_display_name(display_name).map_err(ChatError::Validation)?;
        if user.display_name != display_name {
            user.display_name = display_name.to_string();
            profile_changed = true;
        }
        has_updates = true;
    }
    if let Some(password) = body.password.as_deref() {
        validate_password(password).map_err(ChatError::Validation)?;
        user.password_hash = super::auth::hash_secret(password)?;
        has_updates = true;
    }
    if !has_updates {
        return Err(ChatError::Validation("No fields to update".into()));
    }

    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.users.update_user(&user).await?;

    // Everyone sharing a chat with this user sees the new profile.
    if profile_changed {
        let notifier = state.notifier.clone();
        let changed = user.clone();
        tokio::spawn(async move {
            notifier.user_changed(&changed).await;
        });
    }

    Ok(Json(UserInfo::from(&user)))
}

/// DELETE /api/users/me
///
/// Account deletion. Chats are detached first (personal chats deleted,
/// groups exited), then every device session is revoked and the account
/// row goes away. Authored messages stay behind under the now-orphaned
/// author id.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<impl IntoResponse, ChatError> {
    let user_id = auth.user.id;

    for request in state.chat_service.purge_user_chats(user_id).await? {
        state.notifier.dispatch(request);
    }
    for session in state.users.delete_sessions_of_user(user_id).await? {
        state.registry.disconnect(&session.id).await;
    }
    state.users.delete_contacts_of_user(user_id).await?;
    state.users.delete_user(user_id).await?;

    tracing::info!(user = user_id, "account deleted");
    Ok(Json(serde_json::json!({})))
}

/// GET /api/users/:userId
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _auth: AuthSession,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ChatError> {
    let user = state
        .users
        .find_user(user_id)
        .await?
        .ok_or(ChatError::NotFound("user"))?;
    Ok(Json(UserInfo::from(&user)))
}
