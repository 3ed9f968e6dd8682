//! Session lifecycle management.
//!
//! [`SessionManager`] owns the live session table. Locking is two-level:
//!
//! - The table itself (`RwLock<HashMap<..>>`) is held only long enough to
//!   insert, look up or remove an entry, so work on one session never
//!   blocks another.
//! - Each [`LiveSession`] has an ingest mutex that serialises
//!   `record_frame` / `end_session` calls for that id in arrival order, and
//!   a state lock held only for the append or a snapshot read. Live stats
//!   reads therefore never wait on face detection and never observe a
//!   half-applied frame.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::analyzer::FrameAnalyzer;
use crate::classifier::FrameMetrics;
use crate::error::CoreError;
use crate::frame::FramePayload;
use crate::session::{RunningStats, Session, SessionInfo, SessionSummary};
use crate::store::SessionStore;
use crate::types::SessionId;

/// Fresh ids drawn before `start_session` gives up on a collision.
const ID_ATTEMPTS: usize = 8;

/// Result of feeding one frame into a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutcome {
    pub metrics: FrameMetrics,
    /// Statistics immediately after this frame was appended.
    pub stats: RunningStats,
    /// 1-based position of this frame in the session.
    pub frame_index: u64,
}

/// Point-in-time view of a live session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStats {
    pub session_id: SessionId,
    pub child_id: String,
    pub module_id: String,
    #[serde(flatten)]
    pub stats: RunningStats,
    pub duration_seconds: f64,
}

/// A registered session and its locks.
struct LiveSession {
    /// Held for the whole of a frame ingest or finalization. `true` once
    /// the session has been finalized.
    ingest: Mutex<bool>,
    state: RwLock<Session>,
}

/// Creates, feeds, reads and finalizes sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<LiveSession>>>,
    analyzer: Arc<FrameAnalyzer>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(analyzer: Arc<FrameAnalyzer>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            analyzer,
            store,
        }
    }

    pub fn analyzer(&self) -> &FrameAnalyzer {
        &self.analyzer
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Register a new, empty session and return its id.
    pub async fn start_session(&self, info: SessionInfo) -> Result<SessionId, CoreError> {
        info.validate()?;

        let mut sessions = self.sessions.write().await;
        let id = (0..ID_ATTEMPTS)
            .map(|_| uuid::Uuid::new_v4())
            .find(|candidate| !sessions.contains_key(candidate))
            .ok_or_else(|| CoreError::Internal("could not allocate a unique session id".into()))?;

        tracing::info!(session_id = %id, child_id = %info.child_id, "Started attention session");
        let session = Session::new(id, info, Utc::now());
        sessions.insert(
            id,
            Arc::new(LiveSession {
                ingest: Mutex::new(false),
                state: RwLock::new(session),
            }),
        );
        Ok(id)
    }

    /// Whether `id` is a live session.
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of live sessions.
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Analyze an encoded frame and append its verdict to the session.
    pub async fn record_frame(
        &self,
        id: SessionId,
        payload: FramePayload,
    ) -> Result<FrameOutcome, CoreError> {
        let live = self.lookup(id).await?;
        let retired = live.ingest.lock().await;
        if *retired {
            return Err(CoreError::SessionNotFound(id));
        }

        let metrics = self.analyzer.analyze(payload).await;
        Ok(Self::append(&live, metrics).await)
    }

    /// Append an already-classified verdict to the session.
    pub async fn record_metrics(
        &self,
        id: SessionId,
        metrics: FrameMetrics,
    ) -> Result<FrameOutcome, CoreError> {
        let live = self.lookup(id).await?;
        let retired = live.ingest.lock().await;
        if *retired {
            return Err(CoreError::SessionNotFound(id));
        }
        Ok(Self::append(&live, metrics).await)
    }

    /// Consistent snapshot of a live session's statistics.
    pub async fn live_stats(&self, id: SessionId) -> Result<LiveStats, CoreError> {
        let live = self.lookup(id).await?;
        let state = live.state.read().await;
        Ok(LiveStats {
            session_id: id,
            child_id: state.info().child_id.clone(),
            module_id: state.info().module_id.clone(),
            stats: *state.stats(),
            duration_seconds: state.elapsed_seconds(Utc::now()),
        })
    }

    /// Finalize a session: summarize, retire, persist, return the summary.
    ///
    /// A session with no frames is left live and `EmptySession` is
    /// returned. Persistence failures are logged only.
    pub async fn end_session(
        &self,
        id: SessionId,
        notes: Option<String>,
    ) -> Result<SessionSummary, CoreError> {
        let live = self.lookup(id).await?;
        let mut retired = live.ingest.lock().await;
        if *retired {
            return Err(CoreError::SessionNotFound(id));
        }

        let summary = live.state.read().await.summarize(Utc::now())?;

        *retired = true;
        self.sessions.write().await.remove(&id);
        drop(retired);

        let state = live.state.read().await;
        match self
            .store
            .save(&summary, state.frames(), notes.as_deref())
            .await
        {
            Ok(()) => tracing::info!(
                session_id = %id,
                child_id = %summary.child_id,
                attention_score = summary.attention_score,
                duration_seconds = summary.duration_seconds,
                backend = self.store.backend(),
                "Session saved"
            ),
            Err(e) => tracing::error!(
                session_id = %id,
                error = %e,
                "Failed to persist session, returning summary anyway"
            ),
        }

        Ok(summary)
    }

    async fn lookup(&self, id: SessionId) -> Result<Arc<LiveSession>, CoreError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::SessionNotFound(id))
    }

    async fn append(live: &LiveSession, metrics: FrameMetrics) -> FrameOutcome {
        let mut state = live.state.write().await;
        state.append(metrics.clone());
        let stats = *state.stats();
        FrameOutcome {
            metrics,
            stats,
            frame_index: stats.total_frames,
        }
    }
}
