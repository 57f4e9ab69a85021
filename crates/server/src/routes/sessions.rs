use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use palaver_shared::validation::validate_device_name;

use crate::error::ChatError;
use crate::models::{AuthSession, SessionInfo, UpdateSessionRequest};
use crate::AppState;

/// GET /api/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<impl IntoResponse, ChatError> {
    let sessions = state.users.sessions_of_user(auth.user.id).await?;
    let mut items = Vec::with_capacity(sessions.len());
    for session in &sessions {
        let connected = state.registry.is_connected(&session.id).await;
        items.push(SessionInfo::from_session(session, connected));
    }
    Ok(Json(items))
}

/// PATCH /api/sessions/current
///
/// Device bookkeeping for the calling session: rename, and push
/// registration. An empty push token clears the registration.
pub async fn update_current(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(body): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let mut session = auth.session;

    if let Some(device_name) = body.device_name.as_deref() {
        let device_name = device_name.trim();
        validate_device_name(device_name).map_err(ChatError::Validation)?;
        session.device_name = device_name.to_string();
    }
    if let Some(push_token) = body.push_token {
        session.push_token = Some(push_token).filter(|token| !token.is_empty());
    }
    if let Some(transport) = body.push_transport {
        session.push_transport = transport;
    }
    session.updated_at = chrono::Utc::now().to_rfc3339();
    state.users.save_session(&session).await?;

    let connected = state.registry.is_connected(&session.id).await;
    Ok(Json(SessionInfo::from_session(&session, connected)))
}

/// DELETE /api/sessions/:sessionId
pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let session = state
        .users
        .find_session(&session_id)
        .await?
        .ok_or(ChatError::NotFound("session"))?;
    if session.user_id != auth.user.id {
        return Err(ChatError::Forbidden("not your session"));
    }

    state.users.delete_session(&session.id).await?;
    state.registry.disconnect(&session.id).await;

    tracing::info!(user = auth.user.id, session = %session.id, "device session revoked");
    Ok(Json(serde_json::json!({})))
}
