use attention_core::error::CoreError;
use attention_core::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `attention_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The session store could not serve a read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status, machine-readable code and client-facing message.
    pub fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::SessionNotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", core.to_string())
                }
                CoreError::EmptySession(_) => {
                    (StatusCode::CONFLICT, "EMPTY_SESSION", core.to_string())
                }
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Store errors ---
            AppError::Store(err) => {
                tracing::error!(error = %err, "Session store error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "Session history is temporarily unavailable".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let id = uuid::Uuid::new_v4();
        let cases = [
            (CoreError::SessionNotFound(id), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (CoreError::EmptySession(id), StatusCode::CONFLICT, "EMPTY_SESSION"),
            (
                CoreError::Validation("child_id must not be empty".into()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                CoreError::Internal("lock poisoned".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let (s, c, _) = AppError::from(err).classify();
            assert_eq!((s, c), (status, code));
        }
    }

    #[test]
    fn internal_messages_are_sanitized() {
        let (_, _, message) = AppError::from(CoreError::Internal("db password wrong".into())).classify();
        assert_eq!(message, "An internal error occurred");
    }

    #[test]
    fn store_errors_are_unavailable() {
        let (status, code, _) = AppError::from(StoreError::Unavailable("down".into())).classify();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "STORE_UNAVAILABLE");
    }
}
