use crate::types::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {0} has no recorded frames")]
    EmptySession(SessionId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
