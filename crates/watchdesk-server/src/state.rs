use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use watchdesk_problem::config::EngineConfig;
use watchdesk_storage::sqlite::SqliteStore;

#[derive(Clone)]
pub struct AppState {
    /// Problem store and directory in one: `SqliteStore` implements both
    /// traits the engine consumes.
    pub store: Arc<SqliteStore>,
    pub engine: EngineConfig,
    pub config: Arc<ServerConfig>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<SqliteStore>, config: ServerConfig) -> Self {
        Self {
            engine: config.display.clone(),
            store,
            config: Arc::new(config),
            start_time: Utc::now(),
        }
    }
}
