use std::time::Duration;

use attention_core::error::CoreError;
use attention_core::frame::FramePayload;
use attention_core::types::SessionId;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::messages::{stats_due, ServerMessage};

/// How long queued outbound messages may take to flush after the stream ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// GET /api/v1/ws/attention/{session_id}
///
/// Upgrades to a frame stream for a live session. Unknown sessions are
/// rejected with 404 before the upgrade.
pub async fn attention_ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<SessionId>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    if !state.sessions.contains(session_id).await {
        return Err(CoreError::SessionNotFound(session_id).into());
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session_id, state)))
}

/// Manage a single frame stream after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Feeds each inbound text/binary frame to the session, in arrival order.
///   4. Cleans up on disconnect, leaving the session itself live.
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, session_id = %session_id, "WebSocket connected");

    let ws_manager = state.ws_manager.clone();
    let mut rx = ws_manager.add(conn_id.clone(), session_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let every = state.config.stats_every_n_frames;

    // Receiver loop: one frame per inbound message.
    while let Some(result) = stream.next().await {
        let payload = match result {
            Ok(Message::Text(text)) => FramePayload::Text(text.as_str().to_owned()),
            Ok(Message::Binary(bytes)) => FramePayload::Binary(bytes.to_vec()),
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
                continue;
            }
            Ok(Message::Ping(_)) => continue,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match state.sessions.record_frame(session_id, payload).await {
            Ok(outcome) => {
                push(&state, &conn_id, ServerMessage::metrics(session_id, &outcome)).await;
                if stats_due(outcome.frame_index, every) {
                    match state.sessions.live_stats(session_id).await {
                        Ok(stats) => {
                            push(&state, &conn_id, ServerMessage::SessionStats(stats)).await;
                        }
                        Err(e) => {
                            tracing::debug!(conn_id = %conn_id, error = %e, "Stats unavailable")
                        }
                    }
                }
            }
            Err(CoreError::SessionNotFound(_)) => {
                tracing::info!(conn_id = %conn_id, session_id = %session_id, "Session ended mid-stream");
                push(&state, &conn_id, ServerMessage::session_ended()).await;
                ws_manager.send(&conn_id, Message::Close(None)).await;
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "Frame rejected");
                push(&state, &conn_id, ServerMessage::error("FRAME_REJECTED", e.to_string())).await;
            }
        }
    }

    // Clean up: dropping the channel lets the sender flush and exit.
    ws_manager.remove(&conn_id).await;
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
    tracing::info!(conn_id = %conn_id, session_id = %session_id, "WebSocket disconnected");
}

async fn push(state: &AppState, conn_id: &str, message: ServerMessage) {
    match message.to_message() {
        Ok(msg) => {
            state.ws_manager.send(conn_id, msg).await;
        }
        Err(e) => tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode message"),
    }
}
