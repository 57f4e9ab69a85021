use serde::{Deserialize, Serialize};

/// Push delivery channel registered for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PushTransport {
    None,
    Apns,
    Fcm,
    Web,
}

/// One installed client on one physical device. Carries the bearer token
/// for HTTP and WebSocket auth and the push routing info for offline
/// delivery.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceSession {
    pub id: String,
    pub user_id: i64,
    pub device_id: String,
    pub device_model: String,
    pub device_name: String,
    pub access_token: String,
    pub push_token: Option<String>,
    pub push_transport: PushTransport,
    pub client_ip: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DeviceSession {
    /// Whether this device can be reached over a push transport at all.
    pub fn wants_push(&self) -> bool {
        self.push_transport != PushTransport::None
            && self.push_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub device_id: String,
    pub device_model: String,
    pub device_name: String,
    pub push_transport: PushTransport,
    pub connected: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionInfo {
    pub fn from_session(session: &DeviceSession, connected: bool) -> Self {
        Self {
            id: session.id.clone(),
            device_id: session.device_id.clone(),
            device_model: session.device_model.clone(),
            device_name: session.device_name.clone(),
            push_transport: session.push_transport,
            connected,
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
        }
    }
}

/// Login result: the bearer token the device authenticates with from now
/// on, plus the account it belongs to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: super::UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub device_name: Option<String>,
    pub push_token: Option<String>,
    pub push_transport: Option<PushTransport>,
}
