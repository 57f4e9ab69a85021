use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::models::AuthSession;
use crate::AppState;

/// Resolves a bearer token to its device session and owning user. Shared
/// by the HTTP extractor below and the WebSocket upgrade path.
pub async fn session_for_token(state: &AppState, token: &str) -> Option<AuthSession> {
    let session = state.users.find_session_by_token(token).await.ok()??;
    let user = state.users.find_user(session.user_id).await.ok()??;
    Some(AuthSession { user, session })
}

impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| unauthorized("Not authenticated"))?;

        session_for_token(state, bearer.token())
            .await
            .ok_or_else(|| unauthorized("Invalid session"))
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
