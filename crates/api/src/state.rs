use std::sync::Arc;

use attention_core::manager::SessionManager;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Live attention sessions, the frame analyzer and the session store.
    pub sessions: Arc<SessionManager>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (frame streams).
    pub ws_manager: Arc<WsManager>,
}
