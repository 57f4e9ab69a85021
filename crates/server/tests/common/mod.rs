#![allow(dead_code)]

use axum::Router;
use palaver_server::models::participants_key;
use palaver_server::push::PushDispatch;
use palaver_server::{config::Config, db, routes, AppState};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

use argon2::PasswordHasher;

pub mod ws_helpers;

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    db::apply_schema(&pool).await.unwrap();

    pool
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        media_dir: std::env::temp_dir()
            .join("palaver-test-media")
            .to_string_lossy()
            .into_owned(),
        apns_endpoint: "https://api.push.apple.com".into(),
        apns_key_path: None,
        apns_key_id: None,
        apns_team_id: None,
        apns_topic: None,
        fcm_endpoint: "https://fcm.googleapis.com/fcm/send".into(),
        fcm_server_key: None,
        vapid_key_path: None,
        vapid_public_key: None,
        vapid_subject: "mailto:test@example.com".into(),
    }
}

/// Shared state for a test server. No push transport is configured, so
/// offline devices simply receive nothing.
pub fn create_test_state(pool: SqlitePool) -> Arc<AppState> {
    AppState::new(pool, test_config(), PushDispatch::default())
}

/// Build a test Axum app with the given pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    routes::build_router(create_test_state(pool))
}

/// Insert an account row. Returns the user id.
pub async fn insert_user(pool: &SqlitePool, username: &str, password: &str) -> i64 {
    let now = chrono::Utc::now().to_rfc3339();
    let salt = argon2::password_hash::SaltString::generate(&mut rand::rngs::OsRng);
    let password_hash = argon2::Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();

    let result = sqlx::query(
        "INSERT INTO users (username, display_name, password_hash, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(username)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    result.last_insert_rowid()
}

/// Attach a recovery key to an existing account.
pub async fn set_recovery_key(pool: &SqlitePool, user_id: i64, key: &str) {
    let salt = argon2::password_hash::SaltString::generate(&mut rand::rngs::OsRng);
    let hash = argon2::Argon2::default()
        .hash_password(key.as_bytes(), &salt)
        .unwrap()
        .to_string();
    sqlx::query("UPDATE users SET recovery_key_hash = ? WHERE id = ?")
        .bind(&hash)
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Create a device session for a user. Returns (session_id, access_token).
pub async fn create_test_session(
    pool: &SqlitePool,
    user_id: i64,
    device_id: &str,
) -> (String, String) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let token = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions
            (id, user_id, device_id, device_model, device_name, access_token,
             push_transport, created_at, updated_at)
         VALUES (?, ?, ?, 'test', 'Test Device', ?, 'none', ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(device_id)
    .bind(&token)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    (session_id, token)
}

/// Create a test user with one logged-in device. Returns (user_id, session_token).
pub async fn create_test_user(pool: &SqlitePool, username: &str, password: &str) -> (i64, String) {
    let user_id = insert_user(pool, username, password).await;
    let (_session_id, token) = create_test_session(pool, user_id, "test-device").await;
    (user_id, token)
}

/// Register a push token on a session.
pub async fn set_push_registration(
    pool: &SqlitePool,
    session_id: &str,
    transport: &str,
    token: &str,
) {
    sqlx::query("UPDATE sessions SET push_transport = ?, push_token = ? WHERE id = ?")
        .bind(transport)
        .bind(token)
        .bind(session_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Create a chat with a relation for every member. Returns the chat id.
pub async fn create_test_chat(
    pool: &SqlitePool,
    owner_id: i64,
    member_ids: &[i64],
    is_personal: bool,
    title: Option<&str>,
) -> String {
    let chat_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let key = participants_key(member_ids);

    sqlx::query(
        "INSERT INTO chats (id, title, is_personal, participants_key, owner_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&chat_id)
    .bind(title)
    .bind(is_personal)
    .bind(&key)
    .bind(owner_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    for member in member_ids {
        sqlx::query("INSERT INTO chat_relations (chat_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&chat_id)
            .bind(member)
            .bind(&now)
            .execute(pool)
            .await
            .unwrap();
    }

    chat_id
}

/// Insert a message row with an explicit timestamp. Returns the message id.
pub async fn seed_message_at(
    pool: &SqlitePool,
    chat_id: &str,
    author_id: i64,
    text: &str,
    created_at: &str,
) -> String {
    let message_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO messages (id, chat_id, author_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message_id)
    .bind(chat_id)
    .bind(author_id)
    .bind(text)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
    message_id
}

/// Insert a message row timestamped now. Returns the message id.
pub async fn seed_message(pool: &SqlitePool, chat_id: &str, author_id: i64, text: &str) -> String {
    let now = chrono::Utc::now().to_rfc3339();
    seed_message_at(pool, chat_id, author_id, text, &now).await
}

/// Insert a media row backed by a real temp file. Returns (media_id, path).
pub async fn seed_media_file(
    pool: &SqlitePool,
    chat_id: Option<&str>,
    message_id: Option<&str>,
) -> (String, String) {
    let media_id = uuid::Uuid::new_v4().to_string();
    let dir = std::env::temp_dir().join("palaver-test-media");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{media_id}.bin"));
    std::fs::write(&path, b"media bytes").unwrap();
    let path_str = path.to_string_lossy().into_owned();

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO media (id, chat_id, message_id, path, file_type, file_size, created_at)
         VALUES (?, ?, ?, ?, 'image/png', 11, ?)",
    )
    .bind(&media_id)
    .bind(chat_id)
    .bind(message_id)
    .bind(&path_str)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    (media_id, path_str)
}
