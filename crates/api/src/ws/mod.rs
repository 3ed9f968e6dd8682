//! WebSocket infrastructure for frame streaming.
//!
//! Provides connection management, heartbeat monitoring, the wire message
//! types, and the HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;
pub mod messages;

pub use handler::attention_ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
