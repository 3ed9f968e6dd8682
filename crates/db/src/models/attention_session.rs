//! Attention session row model and DTOs.

use attention_core::classifier::FrameMetrics;
use attention_core::session::{EngagementLevel, SessionSummary};
use attention_core::types::{SessionId, Timestamp};
use serde::Serialize;
use serde_json::json;
use sqlx::FromRow;

/// A row from the `attention_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttentionSession {
    pub id: SessionId,
    pub child_id: String,
    pub module_id: String,
    pub video_url: String,
    pub video_duration_seconds: i32,
    pub session_start: Timestamp,
    pub session_end: Timestamp,
    pub duration_seconds: f64,
    pub attention_score: f64,
    pub engagement_level: String,
    pub total_frames: i64,
    pub attentive_frames: i64,
    pub frames_with_face: i64,
    pub frames_without_face: i64,
    pub avg_eye_aspect_ratio: f64,
    pub avg_head_tilt_degrees: f64,
    pub avg_camera_quality: f64,
    pub attention_breaks: i64,
    pub longest_attention_span: i64,
    pub avg_attention_span: f64,
    pub notes: Option<String>,
    pub raw_session_data: serde_json::Value,
    pub created_at: Timestamp,
}

impl AttentionSession {
    /// Rebuild the domain summary from a stored row.
    pub fn into_summary(self) -> Result<SessionSummary, String> {
        let engagement_level: EngagementLevel = self.engagement_level.parse()?;
        Ok(SessionSummary {
            session_id: self.id,
            child_id: self.child_id,
            module_id: self.module_id,
            video_url: self.video_url,
            video_duration_seconds: self.video_duration_seconds.max(0) as u32,
            started_at: self.session_start,
            ended_at: self.session_end,
            duration_seconds: self.duration_seconds,
            attention_score: self.attention_score,
            engagement_level,
            total_frames: to_count(self.total_frames),
            attentive_frames: to_count(self.attentive_frames),
            frames_with_face: to_count(self.frames_with_face),
            frames_without_face: to_count(self.frames_without_face),
            avg_eye_aspect_ratio: self.avg_eye_aspect_ratio,
            avg_head_tilt_degrees: self.avg_head_tilt_degrees,
            avg_camera_quality: self.avg_camera_quality,
            attention_breaks: to_count(self.attention_breaks),
            longest_attention_span: to_count(self.longest_attention_span),
            avg_attention_span: self.avg_attention_span,
        })
    }
}

/// DTO for inserting a finished session.
#[derive(Debug, Clone)]
pub struct CreateAttentionSession {
    pub id: SessionId,
    pub child_id: String,
    pub module_id: String,
    pub video_url: String,
    pub video_duration_seconds: i32,
    pub session_start: Timestamp,
    pub session_end: Timestamp,
    pub duration_seconds: f64,
    pub attention_score: f64,
    pub engagement_level: String,
    pub total_frames: i64,
    pub attentive_frames: i64,
    pub frames_with_face: i64,
    pub frames_without_face: i64,
    pub avg_eye_aspect_ratio: f64,
    pub avg_head_tilt_degrees: f64,
    pub avg_camera_quality: f64,
    pub attention_breaks: i64,
    pub longest_attention_span: i64,
    pub avg_attention_span: f64,
    pub notes: Option<String>,
    pub raw_session_data: serde_json::Value,
}

impl CreateAttentionSession {
    pub fn new(summary: &SessionSummary, frames: &[FrameMetrics], notes: Option<&str>) -> Self {
        Self {
            id: summary.session_id,
            child_id: summary.child_id.clone(),
            module_id: summary.module_id.clone(),
            video_url: summary.video_url.clone(),
            video_duration_seconds: i32::try_from(summary.video_duration_seconds)
                .unwrap_or(i32::MAX),
            session_start: summary.started_at,
            session_end: summary.ended_at,
            duration_seconds: summary.duration_seconds,
            attention_score: summary.attention_score,
            engagement_level: summary.engagement_level.as_str().to_string(),
            total_frames: to_column(summary.total_frames),
            attentive_frames: to_column(summary.attentive_frames),
            frames_with_face: to_column(summary.frames_with_face),
            frames_without_face: to_column(summary.frames_without_face),
            avg_eye_aspect_ratio: summary.avg_eye_aspect_ratio,
            avg_head_tilt_degrees: summary.avg_head_tilt_degrees,
            avg_camera_quality: summary.avg_camera_quality,
            attention_breaks: to_column(summary.attention_breaks),
            longest_attention_span: to_column(summary.longest_attention_span),
            avg_attention_span: summary.avg_attention_span,
            notes: notes.map(str::to_owned),
            raw_session_data: raw_session_data(frames),
        }
    }
}

/// Per-frame history in columnar form.
pub fn raw_session_data(frames: &[FrameMetrics]) -> serde_json::Value {
    json!({
        "frames_analyzed": frames.len(),
        "timestamps": frames.iter().map(|f| f.timestamp).collect::<Vec<_>>(),
        "is_attentive": frames.iter().map(|f| f.is_attentive).collect::<Vec<_>>(),
        "eye_aspect_ratios": frames.iter().map(|f| f.eye_aspect_ratio).collect::<Vec<_>>(),
        "head_tilts": frames.iter().map(|f| f.head_tilt_degrees).collect::<Vec<_>>(),
        "face_detected": frames.iter().map(|f| f.face_detected).collect::<Vec<_>>(),
        "camera_quality": frames.iter().map(|f| f.camera_quality).collect::<Vec<_>>(),
        "precision": frames.iter().map(|f| f.precision).collect::<Vec<_>>(),
    })
}

fn to_column(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
