mod fanout;

pub use fanout::Notifier;

use serde::{Serialize, Serializer};

use crate::models::{Chat, ChatRelation};

/// Everything a client can be told about, live or via push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatEvent {
    Message,
    MessageUpdate,
    ChatUpdate,
    ChatCleared,
    ChatDeleted,
    AddedUsers,
    RemovedUsers,
    UserUpdate,
    Typing,
}

/// Who caused an event. Serialized as the decimal user id, or "system"
/// for server-initiated notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    User(i64),
    System,
}

impl Serialize for EventSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventSource::User(id) => serializer.serialize_str(&id.to_string()),
            EventSource::System => serializer.serialize_str("system"),
        }
    }
}

/// Wire envelope delivered to clients. The same shape travels over the
/// WebSocket and inside push payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub event: ChatEvent,
    pub source: EventSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// A delivery order produced by a completed state change. The state
/// machine returns one of these; the [`Notifier`] turns it into per-device
/// sends.
#[derive(Debug, Clone)]
pub struct FanoutRequest {
    pub chat: Chat,
    pub event: ChatEvent,
    pub source: EventSource,
    pub payload: Option<serde_json::Value>,
    /// Recipient snapshot for operations that delete the relation rows
    /// before fanout could read them (personal-chat deletion).
    pub recipients: Option<Vec<ChatRelation>>,
}

impl FanoutRequest {
    pub fn new(
        chat: Chat,
        event: ChatEvent,
        source: EventSource,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            chat,
            event,
            source,
            payload,
            recipients: None,
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<ChatRelation>) -> Self {
        self.recipients = Some(recipients);
        self
    }

    pub fn notification(&self) -> Notification {
        Notification {
            event: self.event,
            source: self.source,
            payload: self.payload.clone(),
        }
    }
}
