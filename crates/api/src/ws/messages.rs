//! Server-to-client frame stream messages.
//!
//! Every message is a JSON text frame of the form
//! `{"type": "<kind>", "data": {...}}`.

use attention_core::classifier::{AttentionState, FrameMetrics};
use attention_core::manager::{FrameOutcome, LiveStats};
use attention_core::types::SessionId;
use axum::extract::ws::Message;
use serde::Serialize;

/// One analyzed frame.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsPayload {
    pub session_id: SessionId,
    pub frame_index: u64,
    pub attention_state: AttentionState,
    #[serde(flatten)]
    pub metrics: FrameMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    AttentionMetrics(MetricsPayload),
    SessionStats(LiveStats),
    Error(ErrorPayload),
}

impl ServerMessage {
    pub fn metrics(session_id: SessionId, outcome: &FrameOutcome) -> Self {
        ServerMessage::AttentionMetrics(MetricsPayload {
            session_id,
            frame_index: outcome.frame_index,
            attention_state: outcome.metrics.attention_state(),
            metrics: outcome.metrics.clone(),
        })
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }

    /// Sent before a stream is closed because its session has ended.
    pub fn session_ended() -> Self {
        Self::error("SESSION_ENDED", "Session has ended or does not exist")
    }

    /// Encode as a WebSocket text frame.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// Whether a `session_stats` message follows the frame at `frame_index`
/// (1-based) when stats are pushed every `every` frames.
pub fn stats_due(frame_index: u64, every: u64) -> bool {
    every > 0 && frame_index % every == 0
}
