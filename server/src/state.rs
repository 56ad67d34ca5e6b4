use std::sync::Arc;

use crate::chat::hub::RealtimeHub;
use crate::config::RealtimeConfig;
use crate::db::DbPool;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Connection registry, presence tracker and event router
    pub hub: Arc<RealtimeHub>,
    /// Heartbeat and presence settings for WebSocket actors
    pub realtime: RealtimeConfig,
    /// Environment name reported by GET /
    pub environment: String,
}

impl AppState {
    pub fn new(db: DbPool, realtime: RealtimeConfig, environment: String) -> Self {
        Self {
            db,
            hub: Arc::new(RealtimeHub::new(&realtime)),
            realtime,
            environment,
        }
    }
}
