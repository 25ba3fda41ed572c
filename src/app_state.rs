use std::sync::Arc;

use actix::Addr;

use crate::ai::AiProvider;
use crate::chat_server::ChatServer;
use crate::config::Config;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub chat_server: Addr<ChatServer>,
    pub store: Arc<dyn Store>,
    pub ai: Arc<dyn AiProvider>,
    pub config: Config,
}
