pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod push;
pub mod repo;
pub mod routes;
pub mod ws;

use std::sync::Arc;

use chat::ChatService;
use config::Config;
use notify::Notifier;
use push::PushDispatch;
use repo::{DynChatsRepository, DynUsersRepository};
use ws::registry::ConnectionRegistry;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub users: DynUsersRepository,
    pub chats: DynChatsRepository,
    pub registry: Arc<ConnectionRegistry>,
    pub chat_service: ChatService,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config, push: PushDispatch) -> Arc<Self> {
        let users: DynUsersRepository = Arc::new(repo::SqliteUsersRepository::new(db.clone()));
        let chats: DynChatsRepository = Arc::new(repo::SqliteChatsRepository::new(db.clone()));
        let registry = Arc::new(ConnectionRegistry::default());
        let notifier = Arc::new(Notifier::new(
            chats.clone(),
            users.clone(),
            registry.clone(),
            push,
        ));
        let chat_service = ChatService::new(chats.clone(), users.clone());

        Arc::new(Self {
            db,
            config,
            users,
            chats,
            registry,
            chat_service,
            notifier,
        })
    }
}
