use crate::config::ServerConfig;
use sessionlog_store::EventStore;
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<EventStore>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: EventStore) -> SharedState {
        Arc::new(Self {
            config,
            store: Arc::new(store),
        })
    }
}
