pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /sessions/start                      start a session (POST)
/// /sessions/end                        end a session, returns the summary (POST)
/// /sessions/{session_id}/stats         live statistics (GET)
/// /children/{child_id}/sessions        persisted history (GET, ?limit=)
///
/// /ws/attention/{session_id}           frame stream (WebSocket)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/start", post(handlers::sessions::start_session))
        .route("/sessions/end", post(handlers::sessions::end_session))
        .route(
            "/sessions/{session_id}/stats",
            get(handlers::sessions::get_session_stats),
        )
        .route(
            "/children/{child_id}/sessions",
            get(handlers::sessions::list_child_sessions),
        )
        .route("/ws/attention/{session_id}", get(ws::attention_ws_handler))
}
