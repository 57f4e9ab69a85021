use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{Chat, ChatRelation, MediaResource, Message, ReadMark};

use super::{ChatsRepository, RepoError};

#[derive(Clone)]
pub struct SqliteChatsRepository {
    db: SqlitePool,
}

impl SqliteChatsRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatsRepository for SqliteChatsRepository {
    async fn find_chat(&self, id: &str) -> Result<Option<Chat>, RepoError> {
        let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(chat)
    }

    async fn find_chat_by_key(
        &self,
        participants_key: &str,
        is_personal: bool,
    ) -> Result<Option<Chat>, RepoError> {
        let chat = sqlx::query_as::<_, Chat>(
            "SELECT * FROM chats WHERE participants_key = ? AND is_personal = ?",
        )
        .bind(participants_key)
        .bind(is_personal)
        .fetch_optional(&self.db)
        .await?;
        Ok(chat)
    }

    async fn chats_of_user(&self, user_id: i64) -> Result<Vec<(Chat, ChatRelation)>, RepoError> {
        let relations = sqlx::query_as::<_, ChatRelation>(
            "SELECT * FROM chat_relations WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut chats = Vec::with_capacity(relations.len());
        for relation in relations {
            let chat = self.find_chat(&relation.chat_id).await?.ok_or_else(|| {
                RepoError::Integrity(format!("relation points at missing chat {}", relation.chat_id))
            })?;
            chats.push((chat, relation));
        }
        Ok(chats)
    }

    async fn save_chat(&self, chat: &Chat) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO chats (id, title, is_personal, participants_key, owner_id, last_message_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                participants_key = excluded.participants_key,
                owner_id = excluded.owner_id,
                last_message_id = excluded.last_message_id,
                updated_at = excluded.updated_at",
        )
        .bind(&chat.id)
        .bind(&chat.title)
        .bind(chat.is_personal)
        .bind(&chat.participants_key)
        .bind(chat.owner_id)
        .bind(&chat.last_message_id)
        .bind(&chat.created_at)
        .bind(&chat.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_chat(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_relation(
        &self,
        chat_id: &str,
        user_id: i64,
    ) -> Result<Option<ChatRelation>, RepoError> {
        let relation = sqlx::query_as::<_, ChatRelation>(
            "SELECT * FROM chat_relations WHERE chat_id = ? AND user_id = ?",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(relation)
    }

    async fn relations_of_chat(&self, chat_id: &str) -> Result<Vec<ChatRelation>, RepoError> {
        let relations = sqlx::query_as::<_, ChatRelation>(
            "SELECT * FROM chat_relations WHERE chat_id = ? ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;
        Ok(relations)
    }

    async fn save_relation(&self, relation: &ChatRelation) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO chat_relations (chat_id, user_id, is_muted, is_archived, is_user_blocked, is_chat_blocked, is_removed_on_device, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(chat_id, user_id) DO UPDATE SET
                is_muted = excluded.is_muted,
                is_archived = excluded.is_archived,
                is_user_blocked = excluded.is_user_blocked,
                is_chat_blocked = excluded.is_chat_blocked,
                is_removed_on_device = excluded.is_removed_on_device",
        )
        .bind(&relation.chat_id)
        .bind(relation.user_id)
        .bind(relation.is_muted)
        .bind(relation.is_archived)
        .bind(relation.is_user_blocked)
        .bind(relation.is_chat_blocked)
        .bind(relation.is_removed_on_device)
        .bind(&relation.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_relation(&self, chat_id: &str, user_id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM chat_relations WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_message(&self, id: &str) -> Result<Option<Message>, RepoError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(message)
    }

    async fn find_message_by_local_id(
        &self,
        chat_id: &str,
        author_id: i64,
        local_id: &str,
    ) -> Result<Option<Message>, RepoError> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE chat_id = ? AND author_id = ? AND local_id = ?",
        )
        .bind(chat_id)
        .bind(author_id)
        .bind(local_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(message)
    }

    async fn messages_before(
        &self,
        chat_id: &str,
        anchor: Option<&Message>,
        count: i64,
    ) -> Result<Vec<Message>, RepoError> {
        let messages = match anchor {
            Some(anchor) => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM messages
                     WHERE chat_id = ? AND is_visible = 1
                       AND (created_at < ? OR (created_at = ? AND id < ?))
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(chat_id)
                .bind(&anchor.created_at)
                .bind(&anchor.created_at)
                .bind(&anchor.id)
                .bind(count)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM messages WHERE chat_id = ? AND is_visible = 1
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(chat_id)
                .bind(count)
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(messages)
    }

    async fn save_message(&self, message: &Message) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO messages (id, local_id, chat_id, author_id, text, file_type, file_size, preview_width, preview_height, is_visible, created_at, edited_at, read_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                file_type = excluded.file_type,
                file_size = excluded.file_size,
                preview_width = excluded.preview_width,
                preview_height = excluded.preview_height,
                is_visible = excluded.is_visible,
                edited_at = excluded.edited_at,
                read_at = excluded.read_at",
        )
        .bind(&message.id)
        .bind(&message.local_id)
        .bind(&message.chat_id)
        .bind(message.author_id)
        .bind(&message.text)
        .bind(&message.file_type)
        .bind(message.file_size)
        .bind(message.preview_width)
        .bind(message.preview_height)
        .bind(message.is_visible)
        .bind(&message.created_at)
        .bind(&message.edited_at)
        .bind(&message.read_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_chat_messages(
        &self,
        chat_id: &str,
        wipe_media: bool,
    ) -> Result<Vec<MediaResource>, RepoError> {
        let removed_media = if wipe_media {
            let media = sqlx::query_as::<_, MediaResource>(
                "SELECT * FROM media WHERE message_id IN (SELECT id FROM messages WHERE chat_id = ?)",
            )
            .bind(chat_id)
            .fetch_all(&self.db)
            .await?;
            sqlx::query(
                "DELETE FROM media WHERE message_id IN (SELECT id FROM messages WHERE chat_id = ?)",
            )
            .bind(chat_id)
            .execute(&self.db)
            .await?;
            media
        } else {
            Vec::new()
        };

        // read_marks cascade with their messages
        sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.db)
            .await?;

        Ok(removed_media)
    }

    async fn find_read_mark(
        &self,
        message_id: &str,
        user_id: i64,
        badge: &str,
    ) -> Result<Option<ReadMark>, RepoError> {
        let mark = sqlx::query_as::<_, ReadMark>(
            "SELECT * FROM read_marks WHERE message_id = ? AND user_id = ? AND badge = ?",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(badge)
        .fetch_optional(&self.db)
        .await?;
        Ok(mark)
    }

    async fn save_read_mark(&self, mark: &ReadMark) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO read_marks (id, message_id, user_id, badge, created_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(message_id, user_id, badge) DO NOTHING",
        )
        .bind(&mark.id)
        .bind(&mark.message_id)
        .bind(mark.user_id)
        .bind(&mark.badge)
        .bind(&mark.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn media_of_message(&self, message_id: &str) -> Result<Vec<MediaResource>, RepoError> {
        let media = sqlx::query_as::<_, MediaResource>("SELECT * FROM media WHERE message_id = ?")
            .bind(message_id)
            .fetch_all(&self.db)
            .await?;
        Ok(media)
    }

    async fn media_of_chat(&self, chat_id: &str) -> Result<Vec<MediaResource>, RepoError> {
        let media = sqlx::query_as::<_, MediaResource>(
            "SELECT * FROM media WHERE chat_id = ? AND message_id IS NULL",
        )
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;
        Ok(media)
    }

    async fn save_media(&self, media: &MediaResource) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO media (id, chat_id, message_id, path, file_type, file_size, width, height, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                chat_id = excluded.chat_id,
                message_id = excluded.message_id,
                file_type = excluded.file_type,
                file_size = excluded.file_size,
                width = excluded.width,
                height = excluded.height",
        )
        .bind(&media.id)
        .bind(&media.chat_id)
        .bind(&media.message_id)
        .bind(&media.path)
        .bind(&media.file_type)
        .bind(media.file_size)
        .bind(media.width)
        .bind(media.height)
        .bind(&media.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_media(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
