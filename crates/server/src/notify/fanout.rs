use std::sync::Arc;

use crate::models::{User, UserInfo};
use crate::push::PushDispatch;
use crate::repo::{DynChatsRepository, DynUsersRepository};
use crate::ws::registry::ConnectionRegistry;

use super::{ChatEvent, EventSource, FanoutRequest};

/// Fans one event out to every eligible device of every eligible chat
/// member: live channel first, push transport as the fallback for message
/// events. Delivery is best effort; a chat operation never fails because a
/// recipient was unreachable.
pub struct Notifier {
    chats: DynChatsRepository,
    users: DynUsersRepository,
    registry: Arc<ConnectionRegistry>,
    push: PushDispatch,
}

impl Notifier {
    pub fn new(
        chats: DynChatsRepository,
        users: DynUsersRepository,
        registry: Arc<ConnectionRegistry>,
        push: PushDispatch,
    ) -> Self {
        Self {
            chats,
            users,
            registry,
            push,
        }
    }

    /// Fire-and-forget delivery on a background task. The caller's request
    /// path returns without waiting on any recipient.
    pub fn dispatch(self: &Arc<Self>, request: FanoutRequest) {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            notifier.deliver(request, None).await;
        });
    }

    /// Synchronous fanout. `exclude_session` suppresses the echo back to
    /// the device that caused the event (typing).
    pub async fn deliver(&self, request: FanoutRequest, exclude_session: Option<&str>) {
        let notification = request.notification();
        let text = match serde_json::to_string(&notification) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(event = ?request.event, "failed to serialize notification: {err}");
                return;
            }
        };

        let relations = match &request.recipients {
            Some(snapshot) => snapshot.clone(),
            None => match self.chats.relations_of_chat(&request.chat.id).await {
                Ok(relations) => relations,
                Err(err) => {
                    tracing::error!(chat = %request.chat.id, "fanout aborted, cannot load members: {err}");
                    return;
                }
            },
        };

        for relation in relations {
            // Blocked relations receive nothing in either direction.
            if relation.is_user_blocked || relation.is_chat_blocked {
                continue;
            }

            let sessions = match self.users.sessions_of_user(relation.user_id).await {
                Ok(sessions) => sessions,
                Err(err) => {
                    tracing::warn!(user = relation.user_id, "skipping recipient, cannot load sessions: {err}");
                    continue;
                }
            };

            for session in sessions {
                if exclude_session == Some(session.id.as_str()) {
                    continue;
                }

                if self.registry.send(&session.id, &text).await {
                    continue;
                }

                // Only new messages wake devices; everything else waits for
                // the next sync. Muted chats never push.
                if request.event == ChatEvent::Message
                    && !relation.is_muted
                    && session.wants_push()
                {
                    self.push.send(&notification, &session).await;
                }
            }
        }
    }

    /// Announces a profile change to every chat the user participates in.
    pub async fn user_changed(&self, user: &User) {
        let chats = match self.chats.chats_of_user(user.id).await {
            Ok(chats) => chats,
            Err(err) => {
                tracing::error!(user = user.id, "cannot announce profile change: {err}");
                return;
            }
        };

        let payload = match serde_json::to_value(UserInfo::from(user)) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(user = user.id, "cannot announce profile change: {err}");
                return;
            }
        };

        for (chat, _relation) in chats {
            let request = FanoutRequest::new(
                chat,
                ChatEvent::UserUpdate,
                EventSource::User(user.id),
                Some(payload.clone()),
            );
            self.deliver(request, None).await;
        }
    }
}
