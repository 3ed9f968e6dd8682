use std::collections::HashMap;

use attention_core::types::{SessionId, Timestamp};
use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

/// Outbound queue of one frame stream.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// An open frame stream.
pub struct WsConnection {
    pub session_id: SessionId,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Registry of open frame streams, keyed by connection id.
///
/// Several connections may stream into the same session (reconnects, a
/// second tab). Dropping a connection never touches its session.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register `conn_id` as streaming into `session_id`.
    ///
    /// The returned receiver feeds the connection's socket sink. Re-using an
    /// id replaces the previous registration.
    pub async fn add(
        &self,
        conn_id: String,
        session_id: SessionId,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (sender, rx) = mpsc::unbounded_channel();
        let connection = WsConnection {
            session_id,
            sender,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, connection);
        rx
    }

    /// Forget a connection. Its sink task drains what is queued, then exits.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Queue `message` for one connection. `false` if it is gone.
    pub async fn send(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    /// Connection ids streaming into `session_id`.
    pub async fn get_by_session(&self, session_id: SessionId) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.session_id == session_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Send `farewell` and then Close to every stream of `session_id`.
    ///
    /// The connections stay registered until their receive loops notice the
    /// close. Returns the number of streams notified.
    pub async fn close_session(&self, session_id: SessionId, farewell: Message) -> usize {
        let conns = self.connections.read().await;
        let mut notified = 0;
        for conn in conns.values().filter(|c| c.session_id == session_id) {
            if conn.sender.send(farewell.clone()).is_ok()
                && conn.sender.send(Message::Close(None)).is_ok()
            {
                notified += 1;
            }
        }
        notified
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every stream and clear the registry. Called once the server
    /// has stopped accepting connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        let count = conns.len();
        conns.clear();
        tracing::info!(count, "Closed all frame streams");
    }

    /// Keep-alive ping to every stream.
    pub async fn ping_all(&self) {
        for conn in self.connections.read().await.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
