use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{Contact, DeviceSession, NewUser, User};

use super::{RepoError, UsersRepository};

#[derive(Clone)]
pub struct SqliteUsersRepository {
    db: SqlitePool,
}

impl SqliteUsersRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsersRepository for SqliteUsersRepository {
    async fn find_user(&self, id: i64) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_users(&self, ids: &[i64]) -> Result<Vec<User>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // SQLite has no array binds; expand the placeholder list by hand.
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM users WHERE id IN ({})", placeholders);
        let mut query = sqlx::query_as::<_, User>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.db).await?)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepoError> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (username, display_name, password_hash, recovery_key_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.username)
        .bind(&new.display_name)
        .bind(&new.password_hash)
        .bind(&new.recovery_key_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: new.username,
            display_name: new.display_name,
            password_hash: new.password_hash,
            recovery_key_hash: new.recovery_key_hash,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn update_user(&self, user: &User) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE users SET username = ?, display_name = ?, password_hash = ?, recovery_key_hash = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(&user.recovery_key_hash)
        .bind(&user.updated_at)
        .bind(user.id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<DeviceSession>, RepoError> {
        let session = sqlx::query_as::<_, DeviceSession>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(session)
    }

    async fn find_session_by_token(&self, token: &str) -> Result<Option<DeviceSession>, RepoError> {
        let session =
            sqlx::query_as::<_, DeviceSession>("SELECT * FROM sessions WHERE access_token = ?")
                .bind(token)
                .fetch_optional(&self.db)
                .await?;
        Ok(session)
    }

    async fn sessions_of_user(&self, user_id: i64) -> Result<Vec<DeviceSession>, RepoError> {
        let sessions = sqlx::query_as::<_, DeviceSession>(
            "SELECT * FROM sessions WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(sessions)
    }

    async fn save_session(&self, session: &DeviceSession) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, device_id, device_model, device_name, access_token, push_token, push_transport, client_ip, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                device_name = excluded.device_name,
                push_token = excluded.push_token,
                push_transport = excluded.push_transport,
                client_ip = excluded.client_ip,
                updated_at = excluded.updated_at",
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.device_id)
        .bind(&session.device_model)
        .bind(&session.device_name)
        .bind(&session.access_token)
        .bind(&session.push_token)
        .bind(session.push_transport)
        .bind(&session.client_ip)
        .bind(&session.created_at)
        .bind(&session.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_sessions_of_user(&self, user_id: i64) -> Result<Vec<DeviceSession>, RepoError> {
        let removed = self.sessions_of_user(user_id).await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(removed)
    }

    async fn delete_sessions_of_device(
        &self,
        user_id: i64,
        device_id: &str,
    ) -> Result<Vec<DeviceSession>, RepoError> {
        let removed = sqlx::query_as::<_, DeviceSession>(
            "SELECT * FROM sessions WHERE user_id = ? AND device_id = ?",
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_all(&self.db)
        .await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = ? AND device_id = ?")
            .bind(user_id)
            .bind(device_id)
            .execute(&self.db)
            .await?;
        Ok(removed)
    }

    async fn contacts_of_user(&self, user_id: i64) -> Result<Vec<Contact>, RepoError> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(contacts)
    }

    async fn save_contact(&self, contact: &Contact) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO contacts (id, user_id, contact_id, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, contact_id) DO NOTHING",
        )
        .bind(&contact.id)
        .bind(contact.user_id)
        .bind(contact.contact_id)
        .bind(&contact.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_contact(&self, user_id: i64, contact_id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM contacts WHERE user_id = ? AND contact_id = ?")
            .bind(user_id)
            .bind(contact_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_contacts_of_user(&self, user_id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM contacts WHERE user_id = ? OR contact_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
