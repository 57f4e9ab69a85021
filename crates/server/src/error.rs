use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::repo::RepoError;

/// Domain errors for chat and account operations, bucketed by how the API
/// reports them. Validation and permission failures abort an operation
/// before it touches storage.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Internal(err.to_string())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ChatError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ChatError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ChatError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ChatError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ChatError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ChatError::Repo(err) => {
                tracing::error!("repository error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ChatError::Internal(err) => {
                tracing::error!("internal error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
