mod chats;
mod users;

pub use chats::SqliteChatsRepository;
pub use users::SqliteUsersRepository;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Chat, ChatRelation, Contact, DeviceSession, MediaResource, Message, NewUser, ReadMark, User,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Persistence seam for accounts, contacts and device sessions.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>, RepoError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    async fn find_users(&self, ids: &[i64]) -> Result<Vec<User>, RepoError>;
    async fn create_user(&self, new: NewUser) -> Result<User, RepoError>;
    async fn update_user(&self, user: &User) -> Result<(), RepoError>;
    async fn delete_user(&self, id: i64) -> Result<(), RepoError>;

    async fn find_session(&self, id: &str) -> Result<Option<DeviceSession>, RepoError>;
    async fn find_session_by_token(&self, token: &str) -> Result<Option<DeviceSession>, RepoError>;
    async fn sessions_of_user(&self, user_id: i64) -> Result<Vec<DeviceSession>, RepoError>;
    async fn save_session(&self, session: &DeviceSession) -> Result<(), RepoError>;
    async fn delete_session(&self, id: &str) -> Result<(), RepoError>;
    /// Removes every session of the user, returning the removed rows so the
    /// caller can tear down their live channels.
    async fn delete_sessions_of_user(&self, user_id: i64) -> Result<Vec<DeviceSession>, RepoError>;
    /// Removes sessions previously issued to the same physical device.
    async fn delete_sessions_of_device(
        &self,
        user_id: i64,
        device_id: &str,
    ) -> Result<Vec<DeviceSession>, RepoError>;

    async fn contacts_of_user(&self, user_id: i64) -> Result<Vec<Contact>, RepoError>;
    async fn save_contact(&self, contact: &Contact) -> Result<(), RepoError>;
    async fn delete_contact(&self, user_id: i64, contact_id: i64) -> Result<(), RepoError>;
    async fn delete_contacts_of_user(&self, user_id: i64) -> Result<(), RepoError>;
}

/// Persistence seam for chats, relations, messages, read marks and media.
#[async_trait]
pub trait ChatsRepository: Send + Sync {
    async fn find_chat(&self, id: &str) -> Result<Option<Chat>, RepoError>;
    async fn find_chat_by_key(
        &self,
        participants_key: &str,
        is_personal: bool,
    ) -> Result<Option<Chat>, RepoError>;
    async fn chats_of_user(&self, user_id: i64) -> Result<Vec<(Chat, ChatRelation)>, RepoError>;
    async fn save_chat(&self, chat: &Chat) -> Result<(), RepoError>;
    async fn delete_chat(&self, id: &str) -> Result<(), RepoError>;

    async fn find_relation(
        &self,
        chat_id: &str,
        user_id: i64,
    ) -> Result<Option<ChatRelation>, RepoError>;
    async fn relations_of_chat(&self, chat_id: &str) -> Result<Vec<ChatRelation>, RepoError>;
    async fn save_relation(&self, relation: &ChatRelation) -> Result<(), RepoError>;
    async fn delete_relation(&self, chat_id: &str, user_id: i64) -> Result<(), RepoError>;

    async fn find_message(&self, id: &str) -> Result<Option<Message>, RepoError>;
    async fn find_message_by_local_id(
        &self,
        chat_id: &str,
        author_id: i64,
        local_id: &str,
    ) -> Result<Option<Message>, RepoError>;
    /// Visible messages strictly older than the anchor, newest first.
    async fn messages_before(
        &self,
        chat_id: &str,
        anchor: Option<&Message>,
        count: i64,
    ) -> Result<Vec<Message>, RepoError>;
    async fn save_message(&self, message: &Message) -> Result<(), RepoError>;
    /// Drops every message of the chat. With `wipe_media` the attachment
    /// rows go too; the removed rows are returned so backing files can be
    /// unlinked.
    async fn delete_chat_messages(
        &self,
        chat_id: &str,
        wipe_media: bool,
    ) -> Result<Vec<MediaResource>, RepoError>;

    async fn find_read_mark(
        &self,
        message_id: &str,
        user_id: i64,
        badge: &str,
    ) -> Result<Option<ReadMark>, RepoError>;
    async fn save_read_mark(&self, mark: &ReadMark) -> Result<(), RepoError>;

    async fn media_of_message(&self, message_id: &str) -> Result<Vec<MediaResource>, RepoError>;
    async fn media_of_chat(&self, chat_id: &str) -> Result<Vec<MediaResource>, RepoError>;
    async fn save_media(&self, media: &MediaResource) -> Result<(), RepoError>;
    async fn delete_media(&self, id: &str) -> Result<(), RepoError>;
}

pub type DynUsersRepository = Arc<dyn UsersRepository>;
pub type DynChatsRepository = Arc<dyn ChatsRepository>;
