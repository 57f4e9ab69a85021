pub mod auth;
pub mod chats;
pub mod contacts;
pub mod messages;
pub mod sessions;
pub mod users;

use crate::ws;
use crate::AppState;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/recover", post(auth::recover));

    let api_routes = Router::new()
        // Users
        .route("/users/me", get(users::get_me))
        .route("/users/me", patch(users::update_me))
        .route("/users/me", delete(users::delete_me))
        .route("/users/{userId}", get(users::get_user))
        // Contacts
        .route("/contacts", get(contacts::list_contacts))
        .route("/contacts", post(contacts::add_contact))
        .route("/contacts/{userId}", delete(contacts::remove_contact))
        // Device sessions
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/current", patch(sessions::update_current))
        .route("/sessions/{sessionId}", delete(sessions::revoke_session))
        // Chats
        .route("/chats", get(chats::list_chats))
        .route("/chats", post(chats::create_chat))
        .route("/chats/{chatId}", get(chats::get_chat))
        .route("/chats/{chatId}", patch(chats::update_chat))
        .route("/chats/{chatId}", delete(chats::delete_chat))
        .route("/chats/{chatId}/settings", patch(chats::update_settings))
        .route("/chats/{chatId}/users", get(chats::list_members))
        .route("/chats/{chatId}/users", post(chats::add_users))
        .route("/chats/{chatId}/users", delete(chats::remove_users))
        .route("/chats/{chatId}/block", post(chats::block_user))
        .route("/chats/{chatId}/unblock", post(chats::unblock_user))
        .route("/chats/{chatId}/exit", post(chats::exit_chat))
        .route("/chats/{chatId}/clear", post(chats::clear_chat))
        // Messages
        .route("/chats/{chatId}/messages", get(messages::list_messages))
        .route("/chats/{chatId}/messages", post(messages::post_message))
        .route("/messages/{messageId}", patch(messages::edit_message))
        .route("/messages/{messageId}", delete(messages::delete_message))
        .route("/messages/{messageId}/read", post(messages::read_message));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .route("/ws", get(ws::handler::ws_handler))
        .with_state(state)
}
