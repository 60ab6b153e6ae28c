use std::sync::Arc;

use crate::config::ServerConfig;
use crate::room::RoomRepository;

/// Shared handle cloned into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<RoomRepository>,
    pub config: ServerConfig,
}
