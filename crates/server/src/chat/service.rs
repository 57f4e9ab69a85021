use std::collections::BTreeSet;

use palaver_shared::constants::{MAX_USERS_PER_ADD, MESSAGE_PAGE_SIZE, PERSONAL_CHAT_MEMBERS};
use palaver_shared::validation::{validate_chat_title, validate_message_text};

use crate::error::ChatError;
use crate::media;
use crate::models::{
    participants_key, Chat, ChatRelation, ChatWithRelation, CreateChatRequest, EditMessageRequest,
    Message, PostMessageRequest, ReadMark, UpdateChatSettingsRequest, User, UserInfo, READ_BADGE,
};
use crate::notify::{ChatEvent, EventSource, FanoutRequest};
use crate::repo::{DynChatsRepository, DynUsersRepository};

/// The chat state machine. Every mutation validates against the caller's
/// relation, persists, and hands back a [`FanoutRequest`] describing what
/// to announce; the caller decides when to dispatch it. Nothing in here
/// touches a socket.
#[derive(Clone)]
pub struct ChatService {
    chats: DynChatsRepository,
    users: DynUsersRepository,
}

impl ChatService {
    pub fn new(chats: DynChatsRepository, users: DynUsersRepository) -> Self {
        Self { chats, users }
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    async fn chat(&self, chat_id: &str) -> Result<Chat, ChatError> {
        self.chats
            .find_chat(chat_id)
            .await?
            .ok_or(ChatError::NotFound("chat"))
    }

    /// The caller's relation; absence means they are not a member.
    async fn relation(&self, chat_id: &str, user_id: i64) -> Result<ChatRelation, ChatError> {
        self.chats
            .find_relation(chat_id, user_id)
            .await?
            .ok_or(ChatError::Forbidden("not a member of this chat"))
    }

    /// Members whose in-chat privileges were revoked cannot write.
    fn check_writable(relation: &ChatRelation) -> Result<(), ChatError> {
        if relation.is_user_blocked {
            return Err(ChatError::Forbidden("you are blocked in this chat"));
        }
        Ok(())
    }

    // --- chats ---

    /// Creates a chat, or returns the existing one when the same member
    /// set already has a chat of the same kind. The dedup lookup keys on
    /// the participants fingerprint, so member order never matters.
    pub async fn create_chat(
        &self,
        requester: i64,
        request: CreateChatRequest,
    ) -> Result<(Chat, Option<FanoutRequest>), ChatError> {
        let mut others: BTreeSet<i64> = request.participants.into_iter().collect();
        others.remove(&requester);
        if others.is_empty() {
            return Err(ChatError::Validation(
                "A chat needs at least one other participant".into(),
            ));
        }
        if others.len() > MAX_USERS_PER_ADD {
            return Err(ChatError::Validation(format!(
                "At most {} users can be added at once",
                MAX_USERS_PER_ADD
            )));
        }
        if request.is_personal && others.len() + 1 != PERSONAL_CHAT_MEMBERS {
            return Err(ChatError::Validation(
                "A personal chat has exactly two participants".into(),
            ));
        }

        let title = if request.is_personal {
            None
        } else {
            let title = request.title.as_deref().unwrap_or("").trim().to_string();
            validate_chat_title(&title).map_err(ChatError::Validation)?;
            Some(title)
        };

        let mut member_ids: Vec<i64> = others.into_iter().collect();
        member_ids.push(requester);
        let found = self.users.find_users(&member_ids).await?;
        if found.len() != member_ids.len() {
            return Err(ChatError::NotFound("user"));
        }

        let key = participants_key(&member_ids);
        if let Some(existing) = self.chats.find_chat_by_key(&key, request.is_personal).await? {
            return Ok((existing, None));
        }

        let now = Self::now();
        let chat = Chat {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            is_personal: request.is_personal,
            participants_key: key,
            owner_id: requester,
            last_message_id: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.chats.save_chat(&chat).await?;
        for user_id in &member_ids {
            self.chats
                .save_relation(&ChatRelation::new(&chat.id, *user_id))
                .await?;
        }

        let fanout = FanoutRequest::new(
            chat.clone(),
            ChatEvent::ChatUpdate,
            EventSource::User(requester),
            Some(serde_json::to_value(&chat)?),
        );
        Ok((chat, Some(fanout)))
    }

    pub async fn chats_of_user(&self, user_id: i64) -> Result<Vec<ChatWithRelation>, ChatError> {
        let rows = self.chats.chats_of_user(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|(chat, relation)| ChatWithRelation { chat, relation })
            .collect())
    }

    pub async fn chat_for_user(
        &self,
        requester: i64,
        chat_id: &str,
    ) -> Result<ChatWithRelation, ChatError> {
        let chat = self.chat(chat_id).await?;
        let relation = self.relation(chat_id, requester).await?;
        Ok(ChatWithRelation { chat, relation })
    }

    pub async fn chat_members(
        &self,
        requester: i64,
        chat_id: &str,
    ) -> Result<Vec<UserInfo>, ChatError> {
        self.chat(chat_id).await?;
        self.relation(chat_id, requester).await?;
        let relations = self.chats.relations_of_chat(chat_id).await?;
        let ids: Vec<i64> = relations.iter().map(|relation| relation.user_id).collect();
        let users = self.users.find_users(&ids).await?;
        Ok(users.iter().map(UserInfo::from).collect())
    }

    /// Retitles a group chat. Personal chats have no title to change.
    pub async fn update_chat(
        &self,
        requester: i64,
        chat_id: &str,
        title: &str,
    ) -> Result<(Chat, FanoutRequest), ChatError> {
        let mut chat = self.chat(chat_id).await?;
        if chat.is_personal {
            return Err(ChatError::Validation("Personal chats have no title".into()));
        }
        let relation = self.relation(chat_id, requester).await?;
        Self::check_writable(&relation)?;

        let title = title.trim();
        validate_chat_title(title).map_err(ChatError::Validation)?;
        chat.title = Some(title.to_string());
        chat.updated_at = Self::now();
        self.chats.save_chat(&chat).await?;

        let fanout = FanoutRequest::new(
            chat.clone(),
            ChatEvent::ChatUpdate,
            EventSource::User(requester),
            Some(serde_json::to_value(&chat)?),
        );
        Ok((chat, fanout))
    }

    /// Per-user chat settings. These touch only the caller's own relation
    /// and are deliberately not gated on block state: a blocked member may
    /// still mute, archive, hide, or block the chat on their side.
    pub async fn update_settings(
        &self,
        requester: i64,
        chat_id: &str,
        changes: UpdateChatSettingsRequest,
    ) -> Result<ChatRelation, ChatError> {
        self.chat(chat_id).await?;
        let mut relation = self.relation(chat_id, requester).await?;
        if let Some(muted) = changes.is_muted {
            relation.is_muted = muted;
        }
        if let Some(archived) = changes.is_archived {
            relation.is_archived = archived;
        }
        if let Some(blocked) = changes.is_chat_blocked {
            relation.is_chat_blocked = blocked;
        }
        if let Some(removed) = changes.is_removed_on_device {
            relation.is_removed_on_device = removed;
        }
        self.chats.save_relation(&relation).await?;
        Ok(relation)
    }

    // --- membership ---

    pub async fn add_users(
        &self,
        requester: i64,
        chat_id: &str,
        user_ids: Vec<i64>,
    ) -> Result<(Vec<User>, FanoutRequest), ChatError> {
        let mut chat = self.chat(chat_id).await?;
        if chat.is_personal {
            return Err(ChatError::Validation(
                "Personal chat membership cannot change".into(),
            ));
        }
        let relation = self.relation(chat_id, requester).await?;
        Self::check_writable(&relation)?;

        let requested: BTreeSet<i64> = user_ids.into_iter().collect();
        if requested.len() > MAX_USERS_PER_ADD {
            return Err(ChatError::Validation(format!(
                "At most {} users can be added at once",
                MAX_USERS_PER_ADD
            )));
        }

        let current = self.chats.relations_of_chat(chat_id).await?;
        let members: BTreeSet<i64> = current.iter().map(|r| r.user_id).collect();
        let net_new: Vec<i64> = requested.difference(&members).copied().collect();
        if net_new.is_empty() {
            return Err(ChatError::Validation("No new users to add".into()));
        }

        let added = self.users.find_users(&net_new).await?;
        if added.len() != net_new.len() {
            return Err(ChatError::NotFound("user"));
        }

        for user in &added {
            self.chats
                .save_relation(&ChatRelation::new(chat_id, user.id))
                .await?;
        }

        let mut all_ids: Vec<i64> = members.into_iter().collect();
        all_ids.extend(&net_new);
        chat.participants_key = participants_key(&all_ids);
        chat.updated_at = Self::now();
        self.chats.save_chat(&chat).await?;

        let infos: Vec<UserInfo> = added.iter().map(UserInfo::from).collect();
        let fanout = FanoutRequest::new(
            chat,
            ChatEvent::AddedUsers,
            EventSource::User(requester),
            Some(serde_json::json!({ "chatId": chat_id, "users": infos })),
        );
        Ok((added, fanout))
    }

    /// Kicks members out of a group chat. Members who blocked the chat are
    /// skipped: blocking wins over removal. Errors when the membership
    /// would not change at all.
    pub async fn remove_users(
        &self,
        requester: i64,
        chat_id: &str,
        user_ids: Vec<i64>,
    ) -> Result<(Vec<i64>, FanoutRequest), ChatError> {
        let mut chat = self.chat(chat_id).await?;
        if chat.is_personal {
            return Err(ChatError::Validation(
                "Personal chat membership cannot change".into(),
            ));
        }
        let relation = self.relation(chat_id, requester).await?;
        Self::check_writable(&relation)?;

        let requested: BTreeSet<i64> = user_ids.into_iter().collect();
        let current = self.chats.relations_of_chat(chat_id).await?;
        let removable: Vec<i64> = current
            .iter()
            .filter(|r| requested.contains(&r.user_id) && !r.is_chat_blocked)
            .map(|r| r.user_id)
            .collect();

        let remaining: Vec<i64> = current
            .iter()
            .map(|r| r.user_id)
            .filter(|id| !removable.contains(id))
            .collect();
        let new_key = participants_key(&remaining);
        if new_key == chat.participants_key {
            return Err(ChatError::Validation("No members to remove".into()));
        }

        for user_id in &removable {
            self.chats.delete_relation(chat_id, *user_id).await?;
        }
        chat.participants_key = new_key;
        chat.updated_at = Self::now();
        self.chats.save_chat(&chat).await?;

        let fanout = FanoutRequest::new(
            chat,
            ChatEvent::RemovedUsers,
            EventSource::User(requester),
            Some(serde_json::json!({ "chatId": chat_id, "userIds": removable })),
        );
        Ok((removable, fanout))
    }

    /// Revokes or restores a member's in-chat privileges. Owner-style
    /// moderation: any unblocked member may do this to any other member.
    pub async fn set_user_block(
        &self,
        requester: i64,
        chat_id: &str,
        target: i64,
        blocked: bool,
    ) -> Result<ChatRelation, ChatError> {
        self.chat(chat_id).await?;
        if target == requester {
            return Err(ChatError::Validation("Cannot block yourself".into()));
        }
        let acting = self.relation(chat_id, requester).await?;
        Self::check_writable(&acting)?;

        let mut relation = self
            .chats
            .find_relation(chat_id, target)
            .await?
            .ok_or(ChatError::NotFound("member"))?;
        relation.is_user_blocked = blocked;
        self.chats.save_relation(&relation).await?;
        Ok(relation)
    }

    /// Leaves a group chat. The leaver does not need write privileges; a
    /// blocked member can still walk away.
    pub async fn exit_chat(&self, requester: i64, chat_id: &str) -> Result<FanoutRequest, ChatError> {
        let mut chat = self.chat(chat_id).await?;
        if chat.is_personal {
            return Err(ChatError::Validation(
                "Personal chats cannot be exited, delete the chat instead".into(),
            ));
        }
        self.relation(chat_id, requester).await?;

        self.chats.delete_relation(chat_id, requester).await?;
        let remaining = self.chats.relations_of_chat(chat_id).await?;
        let remaining_ids: Vec<i64> = remaining.iter().map(|r| r.user_id).collect();
        chat.participants_key = participants_key(&remaining_ids);
        chat.updated_at = Self::now();
        self.chats.save_chat(&chat).await?;

        Ok(FanoutRequest::new(
            chat,
            ChatEvent::RemovedUsers,
            EventSource::User(requester),
            Some(serde_json::json!({ "chatId": chat_id, "userIds": [requester] })),
        ))
    }

    /// Deletes a chat. Personal chats vanish entirely for both sides.
    /// Group chats keep their row and membership: history is wiped and the
    /// chat is hidden on members' devices instead.
    pub async fn delete_chat(
        &self,
        requester: i64,
        chat_id: &str,
    ) -> Result<FanoutRequest, ChatError> {
        let chat = self.chat(chat_id).await?;
        let relations = self.chats.relations_of_chat(chat_id).await?;

        if chat.is_personal {
            if !relations.iter().any(|r| r.user_id == requester) {
                return Err(ChatError::Forbidden("not a member of this chat"));
            }
        } else if chat.owner_id != requester {
            return Err(ChatError::Forbidden("only the owner can delete a group chat"));
        }

        let mut removed_media = self.chats.delete_chat_messages(chat_id, true).await?;
        let payload = serde_json::json!({ "chatId": chat.id });

        let fanout = if chat.is_personal {
            // The chat row and relations are about to disappear; keep a
            // snapshot so the deletion can still be announced.
            for resource in self.chats.media_of_chat(chat_id).await? {
                self.chats.delete_media(&resource.id).await?;
                removed_media.push(resource);
            }
            self.chats.delete_chat(chat_id).await?;
            FanoutRequest::new(
                chat,
                ChatEvent::ChatDeleted,
                EventSource::User(requester),
                Some(payload),
            )
            .with_recipients(relations)
        } else {
            let mut chat = chat;
            chat.last_message_id = None;
            chat.updated_at = Self::now();
            self.chats.save_chat(&chat).await?;
            for mut relation in relations {
                if relation.is_chat_blocked {
                    continue;
                }
                relation.is_removed_on_device = true;
                self.chats.save_relation(&relation).await?;
            }
            FanoutRequest::new(
                chat,
                ChatEvent::ChatDeleted,
                EventSource::User(requester),
                Some(payload),
            )
        };

        media::remove_files(removed_media.into_iter().map(|m| m.path).collect());
        Ok(fanout)
    }

    /// Wipes a chat's history without touching membership.
    pub async fn clear_chat(
        &self,
        requester: i64,
        chat_id: &str,
        wipe_media: bool,
    ) -> Result<FanoutRequest, ChatError> {
        let mut chat = self.chat(chat_id).await?;
        if chat.is_personal {
            self.relation(chat_id, requester).await?;
        } else if chat.owner_id != requester {
            return Err(ChatError::Forbidden("only the owner can clear a group chat"));
        }

        let removed_media = self.chats.delete_chat_messages(chat_id, wipe_media).await?;
        media::remove_files(removed_media.into_iter().map(|m| m.path).collect());

        chat.last_message_id = None;
        chat.updated_at = Self::now();
        self.chats.save_chat(&chat).await?;

        Ok(FanoutRequest::new(
            chat,
            ChatEvent::ChatCleared,
            EventSource::User(requester),
            Some(serde_json::json!({ "chatId": chat_id })),
        ))
    }

    // --- messages ---

    /// Posts a message. A new message resurfaces the conversation: the
    /// author's archive/hide flags reset, and in personal chats the
    /// recipient's hide flag resets too.
    pub async fn post_message(
        &self,
        author: i64,
        chat_id: &str,
        request: PostMessageRequest,
    ) -> Result<(Message, Option<FanoutRequest>), ChatError> {
        let mut chat = self.chat(chat_id).await?;
        let mut sender = self.relation(chat_id, author).await?;
        Self::check_writable(&sender)?;

        let text = request
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let file_type = request
            .file_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let file_size = request.file_size.unwrap_or(0).max(0);
        let has_attachment = file_type.is_some() && file_size > 0;

        if text.is_none() && !has_attachment {
            return Err(ChatError::Validation(
                "A message needs text or an attachment".into(),
            ));
        }
        if let Some(text) = text {
            validate_message_text(text).map_err(ChatError::Validation)?;
        }

        // Client retries carry the same localId; hand back what the first
        // attempt stored instead of duplicating.
        let local_id = request.local_id.as_deref().filter(|l| !l.is_empty());
        if let Some(local_id) = local_id {
            if let Some(existing) = self
                .chats
                .find_message_by_local_id(chat_id, author, local_id)
                .await?
            {
                return Ok((existing, None));
            }
        }

        let now = Self::now();
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            local_id: local_id.map(str::to_string),
            chat_id: chat_id.to_string(),
            author_id: author,
            text: text.map(str::to_string),
            file_type: file_type.map(str::to_string),
            file_size,
            preview_width: request.preview_width,
            preview_height: request.preview_height,
            is_visible: true,
            created_at: now.clone(),
            edited_at: None,
            read_at: None,
        };
        self.chats.save_message(&message).await?;

        if sender.is_archived || sender.is_removed_on_device {
            sender.is_archived = false;
            sender.is_removed_on_device = false;
            self.chats.save_relation(&sender).await?;
        }
        if chat.is_personal {
            for mut relation in self.chats.relations_of_chat(chat_id).await? {
                if relation.user_id != author && relation.is_removed_on_device {
                    relation.is_removed_on_device = false;
                    self.chats.save_relation(&relation).await?;
                }
            }
        }

        chat.last_message_id = Some(message.id.clone());
        chat.updated_at = now;
        self.chats.save_chat(&chat).await?;

        let fanout = FanoutRequest::new(
            chat,
            ChatEvent::Message,
            EventSource::User(author),
            Some(serde_json::to_value(&message)?),
        );
        Ok((message, Some(fanout)))
    }

    /// Edits a message in place. `editedAt` refreshes only when the text
    /// actually changes; tombstones are immutable.
    pub async fn edit_message(
        &self,
        editor: i64,
        message_id: &str,
        request: EditMessageRequest,
    ) -> Result<(Message, FanoutRequest), ChatError> {
        let mut message = self
            .chats
            .find_message(message_id)
            .await?
            .ok_or(ChatError::NotFound("message"))?;
        if message.author_id != editor {
            return Err(ChatError::Forbidden("only the author can edit a message"));
        }
        if message.is_tombstone() {
            return Err(ChatError::Validation("Deleted messages cannot be edited".into()));
        }
        let chat = self.chat(&message.chat_id).await?;

        if let Some(text) = request.text.as_deref() {
            let text = text.trim();
            validate_message_text(text).map_err(ChatError::Validation)?;
            if message.text.as_deref() != Some(text) {
                message.text = Some(text.to_string());
                message.edited_at = Some(Self::now());
            }
        }
        if let Some(file_type) = request.file_type {
            message.file_type = Some(file_type);
        }
        if let Some(file_size) = request.file_size {
            message.file_size = file_size.max(0);
        }
        if let Some(visible) = request.is_visible {
            message.is_visible = visible;
        }
        self.chats.save_message(&message).await?;

        let fanout = FanoutRequest::new(
            chat,
            ChatEvent::MessageUpdate,
            EventSource::User(editor),
            Some(serde_json::to_value(&message)?),
        );
        Ok((message, fanout))
    }

    /// Soft-deletes a message: the row survives as an empty tombstone so
    /// ordering and reply anchors stay intact. Attachment files are
    /// removed for real. Deleting a tombstone again is a quiet no-op.
    pub async fn delete_message(
        &self,
        requester: i64,
        message_id: &str,
    ) -> Result<(Message, Option<FanoutRequest>), ChatError> {
        let mut message = self
            .chats
            .find_message(message_id)
            .await?
            .ok_or(ChatError::NotFound("message"))?;
        if message.author_id != requester {
            return Err(ChatError::Forbidden("only the author can delete a message"));
        }
        if message.is_tombstone() {
            return Ok((message, None));
        }
        let chat = self.chat(&message.chat_id).await?;

        message.text = Some(String::new());
        message.file_size = 0;
        message.edited_at = Some(Self::now());
        self.chats.save_message(&message).await?;

        let mut paths = Vec::new();
        for resource in self.chats.media_of_message(&message.id).await? {
            self.chats.delete_media(&resource.id).await?;
            paths.push(resource.path);
        }
        media::remove_files(paths);

        let fanout = FanoutRequest::new(
            chat,
            ChatEvent::MessageUpdate,
            EventSource::User(requester),
            Some(serde_json::to_value(&message)?),
        );
        Ok((message, Some(fanout)))
    }

    /// Records a read receipt. The first receipt stamps `readAt` on the
    /// message; repeat receipts from the same reader change nothing and
    /// announce nothing.
    pub async fn read_message(
        &self,
        reader: i64,
        message_id: &str,
    ) -> Result<(Message, Option<FanoutRequest>), ChatError> {
        let mut message = self
            .chats
            .find_message(message_id)
            .await?
            .ok_or(ChatError::NotFound("message"))?;
        let chat = self.chat(&message.chat_id).await?;
        self.relation(&message.chat_id, reader).await?;

        if self
            .chats
            .find_read_mark(message_id, reader, READ_BADGE)
            .await?
            .is_some()
        {
            return Ok((message, None));
        }

        let mark = ReadMark {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: message_id.to_string(),
            user_id: reader,
            badge: READ_BADGE.to_string(),
            created_at: Self::now(),
        };
        self.chats.save_read_mark(&mark).await?;

        if message.read_at.is_none() {
            message.read_at = Some(mark.created_at);
            self.chats.save_message(&message).await?;
        }

        let fanout = FanoutRequest::new(
            chat,
            ChatEvent::MessageUpdate,
            EventSource::User(reader),
            Some(serde_json::to_value(&message)?),
        );
        Ok((message, Some(fanout)))
    }

    /// History page: visible messages older than `before`, newest first.
    pub async fn list_messages(
        &self,
        requester: i64,
        chat_id: &str,
        before: Option<&str>,
        count: Option<i64>,
    ) -> Result<Vec<Message>, ChatError> {
        self.chat(chat_id).await?;
        self.relation(chat_id, requester).await?;

        let anchor = match before {
            Some(message_id) => Some(
                self.chats
                    .find_message(message_id)
                    .await?
                    .ok_or(ChatError::NotFound("message"))?,
            ),
            None => None,
        };
        let count = count.unwrap_or(MESSAGE_PAGE_SIZE).max(1);
        Ok(self
            .chats
            .messages_before(chat_id, anchor.as_ref(), count)
            .await?)
    }

    /// Validates a typing signal and shapes its fanout. Typing is
    /// ephemeral: nothing persists, and it never falls back to push.
    pub async fn typing(
        &self,
        user_id: i64,
        chat_id: &str,
        active: bool,
    ) -> Result<FanoutRequest, ChatError> {
        let chat = self.chat(chat_id).await?;
        let relation = self.relation(chat_id, user_id).await?;
        Self::check_writable(&relation)?;

        Ok(FanoutRequest::new(
            chat,
            ChatEvent::Typing,
            EventSource::User(user_id),
            Some(serde_json::json!({ "chatId": chat_id, "userId": user_id, "active": active })),
        ))
    }

    // --- account removal ---

    /// Detaches a user from every chat before their account goes away.
    /// Personal chats are deleted outright (a one-member personal chat
    /// would violate the membership shape); group chats are exited. The
    /// resulting events are system-sourced since the acting account stops
    /// existing. Failures are logged per chat and never stop the purge.
    pub async fn purge_user_chats(&self, user_id: i64) -> Result<Vec<FanoutRequest>, ChatError> {
        let mut requests = Vec::new();
        for (chat, _relation) in self.chats.chats_of_user(user_id).await? {
            let outcome = if chat.is_personal {
                self.delete_chat(user_id, &chat.id).await
            } else {
                self.exit_chat(user_id, &chat.id).await
            };
            match outcome {
                Ok(mut request) => {
                    request.source = EventSource::System;
                    requests.push(request);
                }
                Err(err) => {
                    tracing::warn!(user = user_id, chat = %chat.id, "account purge skipped a chat: {err}");
                }
            }
        }
        Ok(requests)
    }
}
