//! Repository for the `attention_sessions` table.

use sqlx::PgPool;

use crate::models::attention_session::{AttentionSession, CreateAttentionSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, child_id, module_id, video_url, video_duration_seconds, \
                       session_start, session_end, duration_seconds, attention_score, \
                       engagement_level, total_frames, attentive_frames, frames_with_face, \
                       frames_without_face, avg_eye_aspect_ratio, avg_head_tilt_degrees, \
                       avg_camera_quality, attention_breaks, longest_attention_span, \
                       avg_attention_span, notes, raw_session_data, created_at";

/// Persists and reads back finished attention sessions.
pub struct AttentionSessionRepo;

impl AttentionSessionRepo {
    /// Insert a finished session, returning the created row.
    pub async fn insert(
        pool: &PgPool,
        input: &CreateAttentionSession,
    ) -> Result<AttentionSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO attention_sessions (
                id, child_id, module_id, video_url, video_duration_seconds,
                session_start, session_end, duration_seconds, attention_score,
                engagement_level, total_frames, attentive_frames, frames_with_face,
                frames_without_face, avg_eye_aspect_ratio, avg_head_tilt_degrees,
                avg_camera_quality, attention_breaks, longest_attention_span,
                avg_attention_span, notes, raw_session_data
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                     $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttentionSession>(&query)
            .bind(input.id)
            .bind(&input.child_id)
            .bind(&input.module_id)
            .bind(&input.video_url)
            .bind(input.video_duration_seconds)
            .bind(input.session_start)
            .bind(input.session_end)
            .bind(input.duration_seconds)
            .bind(input.attention_score)
            .bind(&input.engagement_level)
            .bind(input.total_frames)
            .bind(input.attentive_frames)
            .bind(input.frames_with_face)
            .bind(input.frames_without_face)
            .bind(input.avg_eye_aspect_ratio)
            .bind(input.avg_head_tilt_degrees)
            .bind(input.avg_camera_quality)
            .bind(input.attention_breaks)
            .bind(input.longest_attention_span)
            .bind(input.avg_attention_span)
            .bind(&input.notes)
            .bind(&input.raw_session_data)
            .fetch_one(pool)
            .await
    }

    /// Find a session by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: uuid::Uuid,
    ) -> Result<Option<AttentionSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM attention_sessions WHERE id = $1");
        sqlx::query_as::<_, AttentionSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent sessions for a child, newest first.
    pub async fn list_by_child(
        pool: &PgPool,
        child_id: &str,
        limit: i64,
    ) -> Result<Vec<AttentionSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attention_sessions
             WHERE child_id = $1
             ORDER BY session_end DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, AttentionSession>(&query)
            .bind(child_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
