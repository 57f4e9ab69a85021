use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use std::sync::Arc;

use argon2::{PasswordHasher, PasswordVerifier};
use palaver_shared::validation::{
    validate_device_name, validate_display_name, validate_password, validate_username,
};

use crate::error::ChatError;
use crate::models::{
    AuthSession, DeviceSession, LoginRequest, LoginResponse, NewUser, PushTransport,
    RecoverRequest, RegisterRequest, UserInfo,
};
use crate::AppState;

pub(crate) fn hash_secret(secret: &str) -> Result<String, ChatError> {
    let salt = argon2::password_hash::SaltString::generate(&mut rand::rngs::OsRng);
    argon2::Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ChatError::Internal(format!("failed to hash credential: {err}")))
}

pub(crate) fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    match argon2::PasswordHash::new(stored_hash) {
        Ok(parsed) => argon2::Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// First hop of a forwarding chain, if any. The server itself sits behind
/// a reverse proxy in every deployment this targets.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let username = body.username.trim().to_lowercase();
    validate_username(&username).map_err(ChatError::Validation)?;
    let display_name = body.display_name.trim().to_string();
    validate_display_name(&display_name).map_err(ChatError::Validation)?;
    validate_password(&body.password).map_err(ChatError::Validation)?;

    if state
        .users
        .find_user_by_username(&username)
        .await?
        .is_some()
    {
        return Err(ChatError::Conflict("Username already taken"));
    }

    let password_hash = hash_secret(&body.password)?;
    let recovery_key = body
        .recovery_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty());
    let recovery_key_hash = match recovery_key {
        Some(key) => Some(hash_secret(key)?),
        None => None,
    };

    let user = state
        .users
        .create_user(NewUser {
            username,
            display_name,
            password_hash,
            recovery_key_hash,
        })
        .await?;

    tracing::info!(user = user.id, "account registered");
    Ok(Json(UserInfo::from(&user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let username = body.username.trim().to_lowercase();
    let user = state
        .users
        .find_user_by_username(&username)
        .await?
        .ok_or(ChatError::Unauthorized("Invalid credentials"))?;
    if !verify_secret(&body.password, &user.password_hash) {
        return Err(ChatError::Unauthorized("Invalid credentials"));
    }

    let device_id = body.device_id.trim().to_string();
    if device_id.is_empty() {
        return Err(ChatError::Validation("A device id is required".into()));
    }
    let device_name = body.device_name.trim().to_string();
    validate_device_name(&device_name).map_err(ChatError::Validation)?;

    // One session per physical device: a fresh login supersedes the old
    // one and closes its live channel.
    for stale in state
        .users
        .delete_sessions_of_device(user.id, &device_id)
        .await?
    {
        state.registry.disconnect(&stale.id).await;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let session = DeviceSession {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        device_id,
        device_model: body.device_model.trim().to_string(),
        device_name,
        access_token: uuid::Uuid::new_v4().to_string(),
        push_token: None,
        push_transport: PushTransport::None,
        client_ip: client_ip(&headers),
        created_at: now.clone(),
        updated_at: now,
    };
    state.users.save_session(&session).await?;

    tracing::info!(user = user.id, session = %session.id, "device logged in");
    Ok(Json(LoginResponse {
        token: session.access_token,
        user: UserInfo::from(&user),
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<impl IntoResponse, ChatError> {
    state.users.delete_session(&auth.session.id).await?;
    state.registry.disconnect(&auth.session.id).await;

    tracing::info!(user = auth.user.id, session = %auth.session.id, "device logged out");
    Ok(Json(serde_json::json!({})))
}

/// POST /api/auth/recover
pub async fn recover(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecoverRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let username = body.username.trim().to_lowercase();
    let mut user = state
        .users
        .find_user_by_username(&username)
        .await?
        .ok_or(ChatError::Unauthorized("Invalid recovery key"))?;
    let matches = user
        .recovery_key_hash
        .as_deref()
        .is_some_and(|stored| verify_secret(body.recovery_key.trim(), stored));
    if !matches {
        return Err(ChatError::Unauthorized("Invalid recovery key"));
    }

    validate_password(&body.new_password).map_err(ChatError::Validation)?;
    user.password_hash = hash_secret(&body.new_password)?;
    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.users.update_user(&user).await?;

    // Every device has to log in again with the new password.
    for stale in state.users.delete_sessions_of_user(user.id).await? {
        state.registry.disconnect(&stale.id).await;
    }

    tracing::info!(user = user.id, "account recovered, all sessions revoked");
    Ok(Json(serde_json::json!({})))
}
