//! Session state: ordered verdict history, running statistics and the
//! run-length (attention span) analysis performed at finalization.

use serde::{Deserialize, Serialize};

use crate::classifier::FrameMetrics;
use crate::error::CoreError;
use crate::types::{SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Session identity
// ---------------------------------------------------------------------------

/// Identifying information supplied when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub child_id: String,
    pub module_id: String,
    pub video_url: String,
    pub video_duration_seconds: u32,
}

impl SessionInfo {
    /// Subject, module and video reference must be non-blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("child_id", &self.child_id),
            ("module_id", &self.module_id),
            ("video_url", &self.video_url),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RunningStats
// ---------------------------------------------------------------------------

/// Statistics maintained incrementally as frames arrive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunningStats {
    pub total_frames: u64,
    pub attentive_frames: u64,
    /// Percentage of attentive frames, `0` with no frames.
    pub attention_score: f64,
    pub frames_with_face: u64,
    pub frames_without_face: u64,
    /// Mean over face-detected frames only.
    pub avg_eye_aspect_ratio: f64,
    /// Mean over face-detected frames only.
    pub avg_head_tilt_degrees: f64,
    /// Mean over all frames.
    pub avg_camera_quality: f64,
}

impl RunningStats {
    /// Fold one verdict into the statistics in O(1).
    pub fn record(&mut self, metrics: &FrameMetrics) {
        self.total_frames += 1;
        if metrics.is_attentive {
            self.attentive_frames += 1;
        }
        self.attention_score = self.attentive_frames as f64 / self.total_frames as f64 * 100.0;

        if metrics.face_detected {
            self.frames_with_face += 1;
            let n = self.frames_with_face as f64;
            self.avg_eye_aspect_ratio =
                incremental_mean(self.avg_eye_aspect_ratio, metrics.eye_aspect_ratio, n);
            self.avg_head_tilt_degrees =
                incremental_mean(self.avg_head_tilt_degrees, metrics.head_tilt_degrees, n);
        } else {
            self.frames_without_face += 1;
        }

        self.avg_camera_quality = incremental_mean(
            self.avg_camera_quality,
            metrics.camera_quality,
            self.total_frames as f64,
        );
    }
}

fn incremental_mean(mean: f64, value: f64, count: f64) -> f64 {
    mean + (value - mean) / count
}

// ---------------------------------------------------------------------------
// Attention spans
// ---------------------------------------------------------------------------

/// Run-length analysis of a verdict sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionSpans {
    /// Attentive runs that were followed by a non-attentive frame.
    pub breaks: u64,
    /// Lengths of all attentive runs in order, including a trailing run.
    pub spans: Vec<u64>,
}

impl AttentionSpans {
    pub fn longest(&self) -> u64 {
        self.spans.iter().copied().max().unwrap_or(0)
    }

    pub fn average(&self) -> f64 {
        if self.spans.is_empty() {
            return 0.0;
        }
        self.spans.iter().sum::<u64>() as f64 / self.spans.len() as f64
    }
}

/// Scan a verdict sequence for attentive runs.
///
/// A break is only counted when an attentive run is followed by a
/// non-attentive frame; a run still open at the end is recorded as a span
/// without a break.
pub fn attention_spans(verdicts: impl IntoIterator<Item = bool>) -> AttentionSpans {
    let mut result = AttentionSpans::default();
    let mut current = 0u64;
    for attentive in verdicts {
        if attentive {
            current += 1;
        } else if current > 0 {
            result.spans.push(current);
            result.breaks += 1;
            current = 0;
        }
    }
    if current > 0 {
        result.spans.push(current);
    }
    result
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

/// Score at or above which engagement is `high`.
pub const HIGH_ENGAGEMENT_SCORE: f64 = 80.0;

/// Score at or above which engagement is `medium`.
pub const MEDIUM_ENGAGEMENT_SCORE: f64 = 50.0;

/// Coarse engagement tier derived from the attention score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_ENGAGEMENT_SCORE {
            EngagementLevel::High
        } else if score >= MEDIUM_ENGAGEMENT_SCORE {
            EngagementLevel::Medium
        } else {
            EngagementLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLevel::High => "high",
            EngagementLevel::Medium => "medium",
            EngagementLevel::Low => "low",
        }
    }
}

impl std::str::FromStr for EngagementLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(EngagementLevel::High),
            "medium" => Ok(EngagementLevel::Medium),
            "low" => Ok(EngagementLevel::Low),
            other => Err(format!("unknown engagement level '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// Immutable result of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub child_id: String,
    pub module_id: String,
    pub video_url: String,
    pub video_duration_seconds: u32,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub duration_seconds: f64,
    pub attention_score: f64,
    pub engagement_level: EngagementLevel,
    pub total_frames: u64,
    pub attentive_frames: u64,
    pub frames_with_face: u64,
    pub frames_without_face: u64,
    pub avg_eye_aspect_ratio: f64,
    pub avg_head_tilt_degrees: f64,
    pub avg_camera_quality: f64,
    pub attention_breaks: u64,
    /// Longest attentive run, in frames.
    pub longest_attention_span: u64,
    /// Mean attentive run, in frames.
    pub avg_attention_span: f64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Mutable per-session aggregate.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    info: SessionInfo,
    started_at: Timestamp,
    frames: Vec<FrameMetrics>,
    stats: RunningStats,
}

impl Session {
    pub fn new(id: SessionId, info: SessionInfo, started_at: Timestamp) -> Self {
        Self {
            id,
            info,
            started_at,
            frames: Vec::new(),
            stats: RunningStats::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn frames(&self) -> &[FrameMetrics] {
        &self.frames
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Append a verdict and update the running statistics.
    pub fn append(&mut self, metrics: FrameMetrics) {
        self.stats.record(&metrics);
        self.frames.push(metrics);
    }

    /// Seconds elapsed since the session started.
    pub fn elapsed_seconds(&self, now: Timestamp) -> f64 {
        seconds_between(self.started_at, now)
    }

    /// Build the final summary. Fails for a session with no frames.
    pub fn summarize(&self, ended_at: Timestamp) -> Result<SessionSummary, CoreError> {
        if self.frames.is_empty() {
            return Err(CoreError::EmptySession(self.id));
        }

        let spans = attention_spans(self.frames.iter().map(|f| f.is_attentive));
        let stats = &self.stats;

        Ok(SessionSummary {
            session_id: self.id,
            child_id: self.info.child_id.clone(),
            module_id: self.info.module_id.clone(),
            video_url: self.info.video_url.clone(),
            video_duration_seconds: self.info.video_duration_seconds,
            started_at: self.started_at,
            ended_at,
            duration_seconds: seconds_between(self.started_at, ended_at),
            attention_score: stats.attention_score,
            engagement_level: EngagementLevel::from_score(stats.attention_score),
            total_frames: stats.total_frames,
            attentive_frames: stats.attentive_frames,
            frames_with_face: stats.frames_with_face,
            frames_without_face: stats.frames_without_face,
            avg_eye_aspect_ratio: stats.avg_eye_aspect_ratio,
            avg_head_tilt_degrees: stats.avg_head_tilt_degrees,
            avg_camera_quality: stats.avg_camera_quality,
            attention_breaks: spans.breaks,
            longest_attention_span: spans.longest(),
            avg_attention_span: spans.average(),
        })
    }
}

fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::fixtures::*;
    use super::*;

    fn session_with(frames: Vec<FrameMetrics>) -> Session {
        let mut session = Session::new(uuid::Uuid::new_v4(), info(), Utc::now());
        for f in frames {
            session.append(f);
        }
        session
    }

    // -- attention_spans ------------------------------------------------------

    #[test]
    fn spans_mixed_sequence() {
        let spans = attention_spans("AAANAANA".chars().map(|c| c == 'A'));
        assert_eq!(spans.breaks, 2);
        assert_eq!(spans.spans, vec![3, 2, 1]);
        assert_eq!(spans.longest(), 3);
        assert!((spans.average() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn spans_all_attentive_has_no_breaks() {
        let spans = attention_spans([true, true, true]);
        assert_eq!(spans.breaks, 0);
        assert_eq!(spans.longest(), 3);
    }

    #[test]
    fn spans_never_attentive() {
        let spans = attention_spans([false, false]);
        assert_eq!(spans, AttentionSpans::default());
        assert_eq!(spans.longest(), 0);
        assert_eq!(spans.average(), 0.0);
    }

    #[test]
    fn spans_consecutive_distractions_count_one_break() {
        let spans = attention_spans("AANNNA".chars().map(|c| c == 'A'));
        assert_eq!(spans.breaks, 1);
        assert_eq!(spans.spans, vec![2, 1]);
    }

    // -- RunningStats ---------------------------------------------------------

    #[test]
    fn stats_invariants_hold_after_every_append() {
        let frames = verdicts("ANAANNAAAN");
        let mut session = Session::new(uuid::Uuid::new_v4(), info(), Utc::now());
        for (i, f) in frames.into_iter().enumerate() {
            session.append(f);
            let attentive = session.frames().iter().filter(|f| f.is_attentive).count();
            assert_eq!(session.stats().total_frames as usize, i + 1);
            assert_eq!(session.stats().total_frames as usize, session.frames().len());
            assert_eq!(session.stats().attentive_frames as usize, attentive);
        }
    }

    #[test]
    fn face_means_exclude_faceless_frames() {
        let session = session_with(vec![verdict(true), no_face(20.0), verdict(false)]);
        let stats = session.stats();
        assert_eq!(stats.frames_with_face, 2);
        assert_eq!(stats.frames_without_face, 1);
        assert!((stats.avg_eye_aspect_ratio - 0.2).abs() < 1e-12);
        assert!((stats.avg_head_tilt_degrees - 5.0).abs() < 1e-12);
        // Quality averages over every frame: (60 + 20 + 60) / 3.
        assert!((stats.avg_camera_quality - 140.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn face_means_zero_without_faces() {
        let session = session_with(vec![no_face(10.0), no_face(30.0)]);
        assert_eq!(session.stats().avg_eye_aspect_ratio, 0.0);
        assert_eq!(session.stats().avg_head_tilt_degrees, 0.0);
        assert!((session.stats().avg_camera_quality - 20.0).abs() < 1e-12);
    }

    #[test]
    fn incremental_means_match_batch_means() {
        let qualities = [12.5, 99.0, 0.0, 47.25, 63.0, 81.5, 5.0];
        let frames: Vec<_> = qualities.iter().map(|&q| no_face(q)).collect();
        let session = session_with(frames);
        let batch = qualities.iter().sum::<f64>() / qualities.len() as f64;
        assert!((session.stats().avg_camera_quality - batch).abs() < 1e-9);
    }

    #[test]
    fn attention_score_is_percentage() {
        let session = session_with(verdicts("AAAN"));
        assert!((session.stats().attention_score - 75.0).abs() < 1e-12);
        assert_eq!(RunningStats::default().attention_score, 0.0);
    }

    // -- summarize ------------------------------------------------------------

    #[test]
    fn summary_of_mixed_session() {
        let session = session_with(verdicts("AAANAANA"));
        let summary = session.summarize(Utc::now()).unwrap();
        assert_eq!(summary.total_frames, 8);
        assert_eq!(summary.attentive_frames, 6);
        assert_eq!(summary.attention_breaks, 2);
        assert_eq!(summary.longest_attention_span, 3);
        assert!((summary.avg_attention_span - 2.0).abs() < 1e-12);
        assert!((summary.attention_score - 75.0).abs() < 1e-12);
        assert_eq!(summary.engagement_level, EngagementLevel::Medium);
    }

    #[test]
    fn summary_of_all_attentive_session() {
        let summary = session_with(verdicts("AAA")).summarize(Utc::now()).unwrap();
        assert_eq!(summary.attention_breaks, 0);
        assert_eq!(summary.longest_attention_span, 3);
        assert_eq!(summary.engagement_level, EngagementLevel::High);
    }

    #[test]
    fn summary_of_empty_session_fails() {
        let session = session_with(Vec::new());
        assert_matches!(session.summarize(Utc::now()), Err(CoreError::EmptySession(id)) if id == session.id());
    }

    #[test]
    fn summary_duration_from_start_to_end() {
        let started = Utc::now();
        let mut session = Session::new(uuid::Uuid::new_v4(), info(), started);
        session.append(verdict(true));
        let summary = session.summarize(started + Duration::milliseconds(90_500)).unwrap();
        assert!((summary.duration_seconds - 90.5).abs() < 1e-9);
    }

    // -- engagement -----------------------------------------------------------

    #[test]
    fn engagement_tiers() {
        assert_eq!(EngagementLevel::from_score(100.0), EngagementLevel::High);
        assert_eq!(EngagementLevel::from_score(80.0), EngagementLevel::High);
        assert_eq!(EngagementLevel::from_score(79.9), EngagementLevel::Medium);
        assert_eq!(EngagementLevel::from_score(50.0), EngagementLevel::Medium);
        assert_eq!(EngagementLevel::from_score(49.9), EngagementLevel::Low);
        assert_eq!(EngagementLevel::from_score(0.0), EngagementLevel::Low);
    }

    #[test]
    fn engagement_round_trips_through_str() {
        for level in [EngagementLevel::High, EngagementLevel::Medium, EngagementLevel::Low] {
            assert_eq!(level.as_str().parse::<EngagementLevel>(), Ok(level));
        }
    }

    // -- SessionInfo ----------------------------------------------------------

    #[test]
    fn info_requires_non_blank_fields() {
        assert!(info().validate().is_ok());
        let blank = SessionInfo {
            module_id: "  ".into(),
            ..info()
        };
        assert_matches!(blank.validate(), Err(CoreError::Validation(msg)) if msg.contains("module_id"));
    }
}
