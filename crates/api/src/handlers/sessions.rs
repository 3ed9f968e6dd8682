//! Handlers for attention session lifecycle and history.

use attention_core::session::SessionInfo;
use attention_core::types::SessionId;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::ws::messages::ServerMessage;

/// Default number of sessions returned by the history endpoint.
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Upper bound on `?limit=` for the history endpoint.
const MAX_HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct EndSessionRequest {
    pub session_id: SessionId,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/sessions/start
pub async fn start_session(
    State(state): State<AppState>,
    Json(input): Json<SessionInfo>,
) -> AppResult<impl IntoResponse> {
    let session_id = state.sessions.start_session(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: StartSessionResponse {
                session_id,
                status: "started",
            },
        }),
    ))
}

/// POST /api/v1/sessions/end
///
/// Finalizes the session and returns its summary. Open frame streams for
/// the session get a `SESSION_ENDED` error and are closed.
pub async fn end_session(
    State(state): State<AppState>,
    Json(input): Json<EndSessionRequest>,
) -> AppResult<impl IntoResponse> {
    let summary = state
        .sessions
        .end_session(input.session_id, input.notes)
        .await?;

    match ServerMessage::session_ended().to_message() {
        Ok(farewell) => {
            let closed = state
                .ws_manager
                .close_session(input.session_id, farewell)
                .await;
            if closed > 0 {
                tracing::info!(
                    session_id = %input.session_id,
                    closed,
                    "Closed frame streams of ended session"
                );
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode session-ended message"),
    }

    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/sessions/{session_id}/stats
pub async fn get_session_stats(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<impl IntoResponse> {
    let stats = state.sessions.live_stats(session_id).await?;

    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// GET /api/v1/children/{child_id}/sessions?limit=
///
/// Most recent finished sessions for a child, newest first.
pub async fn list_child_sessions(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let sessions = state
        .sessions
        .store()
        .recent_for_child(&child_id, limit)
        .await?;

    Ok(Json(DataResponse { data: sessions }))
}
