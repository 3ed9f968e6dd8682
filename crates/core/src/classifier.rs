//! Per-frame attention classification.
//!
//! Combines the selected [`FaceObservation`] with the frame's quality score
//! into a single [`FrameMetrics`] verdict using configurable thresholds.

use serde::{Deserialize, Serialize};

use crate::detection::FaceObservation;
use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// EAR at or above which the eyes count as open.
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.23;

/// Head tilt (degrees) at or below which the head counts as forward.
pub const DEFAULT_ANGLE_MAX_DEGREES: f64 = 20.0;

/// EAR substituted when only a face region is available.
pub const DEFAULT_FALLBACK_EAR: f64 = 0.3;

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub ear_threshold: f64,
    pub angle_max_degrees: f64,
    pub fallback_ear: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            angle_max_degrees: DEFAULT_ANGLE_MAX_DEGREES,
            fallback_ear: DEFAULT_FALLBACK_EAR,
        }
    }
}

impl Thresholds {
    /// All values must be finite and non-negative; the angle must not
    /// exceed 180 degrees.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("ear_threshold", self.ear_threshold),
            ("angle_max_degrees", self.angle_max_degrees),
            ("fallback_ear", self.fallback_ear),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::Validation(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.angle_max_degrees > 180.0 {
            return Err(CoreError::Validation(format!(
                "angle_max_degrees must be at most 180, got {}",
                self.angle_max_degrees
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FrameMetrics
// ---------------------------------------------------------------------------

/// How the eye and head measurements of a frame were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementPrecision {
    /// Measured from facial landmarks.
    Landmarks,
    /// Face found but only its bounding box; EAR and tilt are substitutes.
    RegionOnly,
    /// No face, or the frame could not be processed.
    Unavailable,
}

/// Three-valued view of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionState {
    Attentive,
    Distracted,
    /// A face is present but eye state and head pose were not measured.
    Unmeasured,
}

/// Per-frame verdict and diagnostic signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub timestamp: Timestamp,
    pub is_attentive: bool,
    pub eye_aspect_ratio: f64,
    pub head_tilt_degrees: f64,
    pub face_detected: bool,
    pub camera_quality: f64,
    pub precision: MeasurementPrecision,
}

impl FrameMetrics {
    /// Verdict recorded for a frame that failed to decode or detect.
    pub fn degraded(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            is_attentive: false,
            eye_aspect_ratio: 0.0,
            head_tilt_degrees: 0.0,
            face_detected: false,
            camera_quality: 0.0,
            precision: MeasurementPrecision::Unavailable,
        }
    }

    pub fn attention_state(&self) -> AttentionState {
        match (self.precision, self.is_attentive) {
            (MeasurementPrecision::RegionOnly, _) => AttentionState::Unmeasured,
            (_, true) => AttentionState::Attentive,
            (_, false) => AttentionState::Distracted,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Produce the verdict for one frame.
pub fn classify(
    observation: &FaceObservation,
    camera_quality: f64,
    thresholds: &Thresholds,
    timestamp: Timestamp,
) -> FrameMetrics {
    let (ear, tilt, precision) = match observation {
        FaceObservation::NotDetected => {
            return FrameMetrics {
                timestamp,
                is_attentive: false,
                eye_aspect_ratio: 0.0,
                head_tilt_degrees: 0.0,
                face_detected: false,
                camera_quality,
                precision: MeasurementPrecision::Unavailable,
            };
        }
        FaceObservation::Detected {
            landmarks: Some(landmarks),
            ..
        } => {
            let (left, right) = landmarks.eye_centers();
            (
                landmarks.mean_eye_aspect_ratio(),
                crate::geometry::head_tilt_degrees(left, right),
                MeasurementPrecision::Landmarks,
            )
        }
        FaceObservation::Detected {
            landmarks: None, ..
        } => (thresholds.fallback_ear, 0.0, MeasurementPrecision::RegionOnly),
    };

    let eyes_open = ear >= thresholds.ear_threshold;
    let head_forward = tilt <= thresholds.angle_max_degrees;

    FrameMetrics {
        timestamp,
        is_attentive: eyes_open && head_forward,
        eye_aspect_ratio: ear,
        head_tilt_degrees: tilt,
        face_detected: true,
        camera_quality,
        precision,
    }
}
