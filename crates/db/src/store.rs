//! [`SessionStore`] backed by PostgreSQL.

use async_trait::async_trait;
use attention_core::classifier::FrameMetrics;
use attention_core::session::SessionSummary;
use attention_core::store::{SessionStore, StoreError};

use crate::models::attention_session::CreateAttentionSession;
use crate::repositories::AttentionSessionRepo;
use crate::DbPool;

/// Writes finished sessions to the `attention_sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn save(
        &self,
        summary: &SessionSummary,
        frames: &[FrameMetrics],
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        let input = CreateAttentionSession::new(summary, frames, notes);
        let row = AttentionSessionRepo::insert(&self.pool, &input)
            .await
            .map_err(store_error)?;
        tracing::debug!(session_id = %row.id, "Inserted attention session row");
        Ok(())
    }

    async fn recent_for_child(
        &self,
        child_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        AttentionSessionRepo::list_by_child(&self.pool, child_id, limit)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(|row| row.into_summary().map_err(StoreError::Backend))
            .collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(store_error)
    }
}
