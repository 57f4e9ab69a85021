mod chat;
mod message;
mod session;
mod user;

pub use chat::*;
pub use message::*;
pub use session::*;
pub use user::*;

use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Authenticated caller: the device session an access token resolved to,
/// plus the user owning it.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub session: DeviceSession,
}
