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
async fn create_personal_chat() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;

    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [bob], "isPersonal": true}))
        .await;
    res.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = res.json();
    assert!(body["title"].is_null());
    assert_eq!(body["isPersonal"], true);
    assert_eq!(body["ownerId"].as_i64().unwrap(), alice);
    // The membership fingerprint is internal
    assert!(body.get("participantsKey").is_none());

    let chat_id = body["id"].as_str().unwrap();
    let relations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_relations WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(relations, 2);
}

#[tokio::test]
async fn create_personal_chat_is_deduplicated() {
    let (server, pool) = setup().await;
    let (alice, alice_token) = common::create_test_user(&pool, "alice", "password123").await;
    let (bob, bob_token) = common::create_test_user(&pool, "bob", "password123").await;

    let (h, v) = auth_header(&alice_token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [bob], "isPersonal": true}))
        .await;
    res.assert_status(StatusCode::CREATED);
    let first: serde_json::Value = res.json();

    // Same pair from the other side dedups to the same chat
    let (h, v) = auth_header(&bob_token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [alice], "isPersonal": true}))
        .await;
    res.assert_status(StatusCode::OK);
    let second: serde_json::Value = res.json();

    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn create_group_chat_dedups_on_member_set() {
    let (server, pool) = setup().await;
    let (_alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let carol = common::insert_user(&pool, "carol", "password123").await;

    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [bob, carol], "title": "Trip"}))
        .await;
    res.assert_status(StatusCode::CREATED);
    let first: serde_json::Value = res.json();

    // Reversed order, different title: still the same group
    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [carol, bob], "title": "Other"}))
        .await;
    res.assert_status(StatusCode::OK);
    let second: serde_json::Value = res.json();

    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["title"], "Trip");
}

#[tokio::test]
async fn create_chat_validation() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let carol = common::insert_user(&pool, "carol", "password123").await;

    // Nobody but the requester
    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [alice], "isPersonal": true}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // A personal chat with three people
    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [bob, carol], "isPersonal": true}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // A group without a title
    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [bob, carol]}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // A member that does not exist
    let (h, v) = auth_header(&token);
    let res = server
        .post("/api/chats")
        .add_header(h, v)
        .json(&json!({"participants": [987654], "isPersonal": true}))
        .await;
    res.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_chats_includes_the_callers_relation() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&token);
    let res = server.get("/api/chats").add_header(h, v).await;
    res.assert_status_ok();

    let list: Vec<serde_json::Value> = res.json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["relation"]["userId"].as_i64().unwrap(), alice);
    assert_eq!(list[0]["relation"]["isMuted"], false);
}

#[tokio::test]
async fn get_chat_requires_membership() {
    let (server, pool) = setup().await;
    let (alice, _token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let (_outsider, outsider_token) =
        common::create_test_user(&pool, "mallory", "password123").await;

    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&outsider_token);
    let res = server
        .get(&format!("/api/chats/{}", chat_id))
        .add_header(h, v)
        .await;
    res.assert_status(StatusCode::FORBIDDEN);

    let (h, v) = auth_header(&outsider_token);
    let res = server.get("/api/chats/no-such-chat").add_header(h, v).await;
    res.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retitle_group_chat() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let group =
        common::create_test_chat(&pool, alice, &[alice, bob], false, Some("Old name")).await;

    let (h, v) = auth_header(&token);
    let res = server
        .patch(&format!("/api/chats/{}", group))
        .add_header(h, v)
        .json(&json!({"title": "New name"}))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["title"], "New name");

    // Personal chats cannot be retitled
    let personal = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;
    let (h, v) = auth_header(&token);
    let res = server
        .patch(&format!("/api/chats/{}", personal))
        .add_header(h, v)
        .json(&json!({"title": "Nope"}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_touch_only_the_callers_relation() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&token);
    let res = server
        .patch(&format!("/api/chats/{}/settings", chat_id))
        .add_header(h, v)
        .json(&json!({"isMuted": true, "isArchived": true}))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["isMuted"], true);
    assert_eq!(body["isArchived"], true);

    let bob_muted: bool =
        sqlx::query_scalar("SELECT is_muted FROM chat_relations WHERE chat_id = ? AND user_id = ?")
            .bind(&chat_id)
            .bind(bob)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(!bob_muted);
}

#[tokio::test]
async fn members_list() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let carol = common::insert_user(&pool, "carol", "password123").await;
    let chat_id =
        common::create_test_chat(&pool, alice, &[alice, bob, carol], false, Some("Trip")).await;

    let (h, v) = auth_header(&token);
    let res = server
        .get(&format!("/api/chats/{}/users", chat_id))
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let list: Vec<serde_json::Value> = res.json();
    assert_eq!(list.len(), 3);
}

#[tokio::test]
async fn block_revokes_write_access() {
    let (server, pool) = setup().await;
    let (alice, alice_token) = common::create_test_user(&pool, "alice", "password123").await;
    let (bob, bob_token) = common::create_test_user(&pool, "bob", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&alice_token);
    let res = server
        .post(&format!("/api/chats/{}/block", chat_id))
        .add_header(h, v)
        .json(&json!({"userId": bob}))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["isUserBlocked"], true);

    // Blocked members cannot post
    let (h, v) = auth_header(&bob_token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "let me in"}))
        .await;
    res.assert_status(StatusCode::FORBIDDEN);

    // They can still read and change their own settings
    let (h, v) = auth_header(&bob_token);
    let res = server
        .get(&format!("/api/chats/{}", chat_id))
        .add_header(h, v)
        .await;
    res.assert_status_ok();

    let (h, v) = auth_header(&bob_token);
    let res = server
        .patch(&format!("/api/chats/{}/settings", chat_id))
        .add_header(h, v)
        .json(&json!({"isMuted": true}))
        .await;
    res.assert_status_ok();

    // Unblock restores posting
    let (h, v) = auth_header(&alice_token);
    server
        .post(&format!("/api/chats/{}/unblock", chat_id))
        .add_header(h, v)
        .json(&json!({"userId": bob}))
        .await
        .assert_status_ok();

    let (h, v) = auth_header(&bob_token);
    let res = server
        .post(&format!("/api/chats/{}/messages", chat_id))
        .add_header(h, v)
        .json(&json!({"text": "thanks"}))
        .await;
    res.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn block_rejects_self_and_non_members() {
    let (server, pool) = setup().await;
    let (alice, token) = common::create_test_user(&pool, "alice", "password123").await;
    let bob = common::insert_user(&pool, "bob", "password123").await;
    let outsider = common::insert_user(&pool, "mallory", "password123").await;
    let chat_id = common::create_test_chat(&pool, alice, &[alice, bob], true, None).await;

    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/block", chat_id))
        .add_header(h, v)
        .json(&json!({"userId": alice}))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = auth_header(&token);
    let res = server
        .post(&format!("/api/chats/{}/block", chat_id))
        .add_header(h, v)
        .json(&json!({"userId": outsider}))
        .await;
    res.assert_status(StatusCode::NOT_FOUND);
}
