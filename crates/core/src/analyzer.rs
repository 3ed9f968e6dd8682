//! Frame analysis pipeline: decode, enhance, score, detect, classify.
//!
//! [`FrameAnalyzer::analyze`] never fails. Decode and detection errors are
//! logged and collapsed into [`FrameMetrics::degraded`] so a single bad
//! frame cannot break a stream.

use std::time::Duration;

use image::GrayImage;

use crate::classifier::{classify, FrameMetrics, Thresholds};
use crate::detection::{DetectionError, Detector, DetectorKind};
use crate::enhance::{equalize_adaptive, ClaheParams};
use crate::frame::{decode_frame, FrameError, FramePayload};
use crate::geometry::camera_quality;
use crate::types::Timestamp;

/// Default upper bound on a single detection call.
pub const DEFAULT_DETECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Analyzer tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    pub thresholds: Thresholds,
    pub clahe: ClaheParams,
    pub detection_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            clahe: ClaheParams::default(),
            detection_timeout: DEFAULT_DETECTION_TIMEOUT,
        }
    }
}

/// Stateless per-frame pipeline shared by all sessions.
#[derive(Debug)]
pub struct FrameAnalyzer {
    detector: Detector,
    config: AnalyzerConfig,
}

/// Output of the CPU-bound preprocessing stage.
struct Prepared {
    gray: GrayImage,
    quality: f64,
    captured_at: Timestamp,
}

impl FrameAnalyzer {
    pub fn new(detector: Detector, config: AnalyzerConfig) -> Self {
        Self { detector, config }
    }

    pub fn detector_kind(&self) -> DetectorKind {
        self.detector.kind()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze one frame, degrading to a "no face, zero quality" verdict on
    /// any failure.
    pub async fn analyze(&self, payload: FramePayload) -> FrameMetrics {
        match self.try_analyze(payload).await {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!(error = %e, "Frame analysis failed, recording degraded verdict");
                FrameMetrics::degraded(chrono::Utc::now())
            }
        }
    }

    /// Analyze one frame, returning the failure instead of degrading.
    pub async fn try_analyze(&self, payload: FramePayload) -> Result<FrameMetrics, FrameError> {
        let clahe = self.config.clahe;
        let prepared = tokio::task::spawn_blocking(move || prepare(&payload, &clahe))
            .await
            .map_err(|e| FrameError::Worker(e.to_string()))??;

        let timeout = self.config.detection_timeout;
        let observation = tokio::time::timeout(timeout, self.detector.observe(&prepared.gray))
            .await
            .map_err(|_| DetectionError::TimedOut(timeout))??;

        let metrics = classify(
            &observation,
            prepared.quality,
            &self.config.thresholds,
            prepared.captured_at,
        );
        tracing::debug!(
            attentive = metrics.is_attentive,
            ear = metrics.eye_aspect_ratio,
            tilt = metrics.head_tilt_degrees,
            quality = metrics.camera_quality,
            "Frame classified"
        );
        Ok(metrics)
    }
}

fn prepare(payload: &FramePayload, clahe: &ClaheParams) -> Result<Prepared, FrameError> {
    let frame = decode_frame(payload)?;
    let gray = equalize_adaptive(&frame.pixels.to_luma8(), clahe);
    let quality = camera_quality(&gray);
    Ok(Prepared {
        gray,
        quality,
        captured_at: frame.captured_at,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::classifier::MeasurementPrecision;
    use crate::detection::{FaceRegion, LandmarkDetector, RegionDetector};
    use crate::frame::fixtures::{data_url, png_bytes};
    use crate::landmarks::fixtures::face;
    use crate::landmarks::Landmarks;

    struct OpenEyes;

    #[async_trait]
    impl LandmarkDetector for OpenEyes {
        async fn detect_landmarks(
            &self,
            _: &GrayImage,
        ) -> Result<Vec<(FaceRegion, Landmarks)>, DetectionError> {
            Ok(vec![(FaceRegion::default(), face(2.0, 0.0))])
        }
    }

    struct Slow;

    #[async_trait]
    impl RegionDetector for Slow {
        async fn detect_regions(&self, _: &GrayImage) -> Result<Vec<FaceRegion>, DetectionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn analyzer(detector: Detector, timeout: Duration) -> FrameAnalyzer {
        FrameAnalyzer::new(
            detector,
            AnalyzerConfig {
                detection_timeout: timeout,
                ..AnalyzerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn analyzes_valid_frame() {
        let analyzer = analyzer(Detector::Precise(Arc::new(OpenEyes)), DEFAULT_DETECTION_TIMEOUT);
        let metrics = analyzer.analyze(FramePayload::Text(data_url(32, 24))).await;
        assert!(metrics.is_attentive);
        assert!(metrics.face_detected);
        assert_eq!(metrics.precision, MeasurementPrecision::Landmarks);
        assert!((0.0..=100.0).contains(&metrics.camera_quality));
    }

    #[tokio::test]
    async fn binary_payload_is_accepted() {
        let analyzer = analyzer(Detector::Precise(Arc::new(OpenEyes)), DEFAULT_DETECTION_TIMEOUT);
        let metrics = analyzer.try_analyze(FramePayload::Binary(png_bytes(16, 16))).await;
        assert!(metrics.unwrap().face_detected);
    }

    #[tokio::test]
    async fn malformed_frame_degrades() {
        let analyzer = analyzer(Detector::Precise(Arc::new(OpenEyes)), DEFAULT_DETECTION_TIMEOUT);
        let payload = FramePayload::Text("data:image/png;base64,????".into());
        assert_matches!(
            analyzer.try_analyze(payload.clone()).await,
            Err(FrameError::Decode(_))
        );
        let metrics = analyzer.analyze(payload).await;
        assert!(!metrics.face_detected);
        assert!(!metrics.is_attentive);
        assert_eq!(metrics.camera_quality, 0.0);
    }

    #[tokio::test]
    async fn slow_detector_times_out_and_degrades() {
        let analyzer = analyzer(Detector::Coarse(Arc::new(Slow)), Duration::from_millis(50));
        assert_matches!(
            analyzer.try_analyze(FramePayload::Binary(png_bytes(8, 8))).await,
            Err(FrameError::Detection(DetectionError::TimedOut(_)))
        );
    }
}
