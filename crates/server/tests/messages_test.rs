mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;

fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

async fn setup() -> (TestServer, sqlx::SqlitePool) {
    let pool = common::setup_test_db().await;
    let app = common::create_test_app(pool.clone());
    let server = TestServer::new(app).unwrap();
    (server, pool)
}

#[tokio::test]
async fn post_message_stores_and_bumps_the_chat() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "  hello there  "}))
        .await;
    res.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = res.json();
    assert_eq!(body["text"], "hello there");
    assert_eq!(body["authorId"].as_i64().unwrap(), alice);
    assert!(body["editedAt"].is_null());

    let last: Option<String> = sqlx::query_scalar("SELECT last_message_id FROM chats WHERE id = ?")
        .bind(&chat_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(last.as_deref(), body["id"].as_str());
}

#[tokio::test]
async fn post_message_validation() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    for body in [json!({}), json!({"text": ""}), json!({"text": "   "})] {
        let (h, v) = auth_header(&token);
        let res = server
            .post(&format!("/api/chats/{}/messages", chat_id))
            .add_header(h, v)
            .json(&body)
            .await;
        res.assert_status(StatusCode::BAD_REQUEST);
    }

    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "x".repeat(2049)}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_attachment_only_message() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"fileType": "image/png", "fileSize": 2048, "previewWidth": 640, "previewHeight": 480}))
        .await;
    res.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = res.json();
    assert!(body["text"].is_null());
    assert_eq!(body["fileType"], "image/png");
    assert_eq!(body["fileSize"], 2048);
}

#[tokio::test]
async fn repeated_local_id_returns_the_first_message() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "hello", "localId": "client-123"}))
        .await;
    res.assert_status(StatusCode::CREATED);
    let first: serde_json::Value = res.json();

    // The retry is answered from storage, not stored again
    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "hello", "localId": "client-123"}))
        .await;
    res.assert_status(StatusCode::OK);
    let second: serde_json::Value = res.json();
    assert_eq!(first["id"], second["id"]);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
        .bind(&chat_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn posting_resurfaces_archived_and_hidden_chats() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    sqlx::query("UPDATE chat_relations SET is_archived = 1 WHERE chat_id = ? AND user_id = ?")
        .bind(&chat_id)
        .bind(alice)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE chat_relations SET is_removed_on_device = 1 WHERE chat_id = ? AND user_id = ?",
    )
    .bind(&chat_id)
    .bind(bob)
    .execute(&pool)
    .await
    .unwrap();

    let (h, v) = auth_header(&token);
    server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "knock knock"}))
        .await
        .assert_status(StatusCode::CREATED);

    let archived: bool =
        sqlx::query_scalar("SELECT is_archived FROM chat_relations WHERE chat_id = ? AND user_id = ?")
            .bind(&chat_id)
            .bind(alice)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(!archived);

    let hidden: bool = sqlx::query_scalar(
        "SELECT is_removed_on_device FROM chat_relations WHERE chat_id = ? AND user_id = ?",
    )
    .bind(&chat_id)
    .bind(bob)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(!hidden);
}

#[tokio::test]
async fn edit_message() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let message_id = common::seed_message(&pool, &chat_id, alice, "helo").await;

    let (h, v) = auth_header(&token);
    let res = server
        .patch(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .json(&json!({"text": "hello"}))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["text"], "hello");
    assert!(body["editedAt"].is_string());

    // Re-sending the same text does not refresh the edit stamp
    let message_id = common::seed_message(&pool, &chat_id, alice, "unchanged").await;
    let (h, v) = auth_header(&token);
    let res = server
        .patch(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .json(&json!({"text": "unchanged"}))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert!(body["editedAt"].is_null());
}

#[tokio::test]
async fn edit_is_author_only() {
    let (server, pool) = setup().await;
    let (alice, _token) = common::create_test_user(&pool, "alice", "password123").await;
    let (bob, bob_token) = common::create_test_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let message_id = common::seed_message(&pool, &chat_id, alice, "mine").await;

    let (h, v) = auth_header(&bob_token);
    let res = server
        .patch(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .json(&json!({"text": "hijacked"}))
        .await;
    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_message_leaves_a_tombstone() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let message_id = common::seed_message(&pool, &chat_id, alice, "regret this").await;

    let (h, v) = auth_header(&token);
    let res = server
        .delete(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["text"], "");
    assert_eq!(body["fileSize"], 0);
    assert!(body["editedAt"].is_string());

    // The row stays so ordering and anchors survive
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE id = ?")
        .bind(&message_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    // Tombstones cannot be edited, but deleting again is fine
    let (h, v) = auth_header(&token);
    let res = server
        .patch(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .json(&json!({"text": "resurrect"}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = auth_header(&token);
    let res = server
        .delete(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
}

#[tokio::test]
async fn delete_is_author_only() {
    let (server, pool) = setup().await;
    let (alice, _token) = common::create_test_user(&pool, "alice", "password123").await;
    let (bob, bob_token) = common::create_test_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let message_id = common::seed_message(&pool, &chat_id, alice, "mine").await;

    let (h, v) = auth_header(&bob_token);
    let res = server
        .delete(&format!("/api/messages/{}", message_id))
        .add_header(h, v)
        .await;
    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn read_receipts_are_recorded_once() {
    let (server, pool) = setup().await;
    let (alice, _token) = common::create_test_user(&pool, "alice", "password123").await;
    let (bob, bob_token) = common::create_test_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let message_id = common::seed_message(&pool, &chat_id, alice, "seen?").await;

    let (h, v) = auth_header(&bob_token);
    let res = server
        .post(&format!("/api/messages/{}/read", message_id))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert!(body["readAt"].is_string());

    // Reading again changes nothing
    let (h, v) = auth_header(&bob_token);
    server
        .post(&format!("/api/messages/{}/read", message_id))
        .add_header(h, v)
        .await
        .assert_status_ok();

    let marks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM read_marks WHERE message_id = ?")
        .bind(&message_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(marks, 1);
}

#[tokio::test]
async fn read_requires_membership() {
    let (server, pool) = setup().await;
    let (alice, _token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let (_mallory, mallory_token) =
        common::create_test_user(&pool, "mallory", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let message_id = common::seed_message(&pool, &chat_id, alice, "private").await;

    let (h, v) = auth_header(&mallory_token);
    let res = server
        .post(&format!("/api/messages/{}/read", message_id))
        .add_header(h, v)
        .await;
    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn message_pages_walk_backwards_in_time() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let mut ids = Vec::new();
    for i in 1..=5 {
        let stamp = format!("2026-01-01T10:0{}:00+00:00", i);
        ids.push(
            common::seed_message_at(&pool, &chat_id, alice, &format!("msg {}", i), &stamp).await,
        );
    }
    // Hidden rows never surface
    let spoiler =
        common::seed_message_at(&pool, &chat_id, bob, "spoiler", "2026-01-01T10:03:30+00:00")
            .await;
    sqlx::query("UPDATE messages SET is_visible = 0 WHERE id = ?")
        .bind(&spoiler)
        .execute(&pool)
        .await
        .unwrap();

    let (h, v) = auth_header(&token);
    let res = server
        .get(&format!("/api/chats/{}/messages?count=2", chat_id))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let page: serde_json::Value = res.json();
    let texts: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["msg 4", "msg 5"]);
    assert_eq!(page["hasMore"], true);
    assert_eq!(page["cursor"].as_str().unwrap(), ids[3]);

    let (h, v) = auth_header(&token);
    let res = server
        .get(&format!(
            "/api/chats/{}/messages?count=2&before={}",
            chat_id, ids[3]
        ))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let page: serde_json::Value = res.json();
    let texts: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["msg 2", "msg 3"]);
    assert_eq!(page["hasMore"], true);

    let (h, v) = auth_header(&token);
    let res = server
        .get(&format!(
            "/api/chats/{}/messages?count=2&before={}",
            chat_id, ids[1]
        ))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let page: serde_json::Value = res.json();
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["text"], "msg 1");
    assert_eq!(page["hasMore"], false);
}

#[tokio::test]
async fn listing_requires_membership() {
    let (server, pool) = setup().await;
    let (alice, _token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let (_mallory, mallory_token) =
        common::create_test_user(&pool, "mallory", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&mallory_token);
    let res = server
        .get(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .await;
    res.assert_status(StatusCode::FORBIDDEN);
}
