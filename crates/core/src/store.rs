//! Durable storage of finished sessions.
//!
//! [`SessionStore`] is the persistence collaborator invoked by the session
//! manager at finalization. Storage is best-effort: a failed save is logged
//! by the caller and never fails `end_session`.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::classifier::FrameMetrics;
use crate::session::SessionSummary;

/// Failure of the persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Session store error: {0}")]
    Backend(String),
}

/// Persistence collaborator for finished sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;

    /// Persist a finished session with its raw verdict history.
    async fn save(
        &self,
        summary: &SessionSummary,
        frames: &[FrameMetrics],
        notes: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Most recent sessions for a subject, newest first.
    async fn recent_for_child(
        &self,
        child_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError>;

    /// Whether the backend is currently reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// A session as held by [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub summary: SessionSummary,
    pub frames: Vec<FrameMetrics>,
    pub notes: Option<String>,
}

/// Process-local store used when no database is configured.
///
/// Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<Vec<StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything saved so far, in save order.
    pub async fn all(&self) -> Vec<StoredSession> {
        self.sessions.read().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn save(
        &self,
        summary: &SessionSummary,
        frames: &[FrameMetrics],
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        self.sessions.write().await.push(StoredSession {
            summary: summary.clone(),
            frames: frames.to_vec(),
            notes: notes.map(str::to_owned),
        });
        Ok(())
    }

    async fn recent_for_child(
        &self,
        child_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<SessionSummary> = sessions
            .iter()
            .filter(|s| s.summary.child_id == child_id)
            .map(|s| s.summary.clone())
            .collect();
        matching.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::session::fixtures::{info, verdicts};
    use crate::session::Session;

    fn summary_for(child: &str, ended_offset_secs: i64) -> (SessionSummary, Vec<FrameMetrics>) {
        let started = Utc::now();
        let mut session = Session::new(
            uuid::Uuid::new_v4(),
            crate::session::SessionInfo {
                child_id: child.into(),
                ..info()
            },
            started,
        );
        for f in verdicts("AAN") {
            session.append(f);
        }
        let summary = session
            .summarize(started + Duration::seconds(ended_offset_secs))
            .unwrap();
        (summary, session.frames().to_vec())
    }

    #[tokio::test]
    async fn saves_summary_frames_and_notes() {
        let store = MemoryStore::new();
        let (summary, frames) = summary_for("kid", 10);
        store.save(&summary, &frames, Some("calm")).await.unwrap();

        let all = store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].summary, summary);
        assert_eq!(all[0].frames.len(), 3);
        assert_eq!(all[0].notes.as_deref(), Some("calm"));
    }

    #[tokio::test]
    async fn recent_for_child_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        for (child, offset) in [("a", 10), ("b", 20), ("a", 30), ("a", 5)] {
            let (summary, frames) = summary_for(child, offset);
            store.save(&summary, &frames, None).await.unwrap();
        }

        let recent = store.recent_for_child("a", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|s| s.child_id == "a"));
        assert!(recent[0].ended_at >= recent[1].ended_at);
        assert!(store.recent_for_child("nobody", 10).await.unwrap().is_empty());
    }
}
