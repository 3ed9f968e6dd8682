//! Face-detection capability.
//!
//! The detection engine itself is an external collaborator. This module
//! defines the two capability variants it can be deployed as:
//!
//! - [`LandmarkDetector`] -- precise; returns face regions with a full
//!   68-point landmark set.
//! - [`RegionDetector`] -- coarse; returns face regions only.
//!
//! The active variant is chosen once at startup and carried in the
//! [`Detector`] tagged union. [`Detector::observe`] reduces the raw
//! candidates to a single [`FaceObservation`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::landmarks::Landmarks;

// ---------------------------------------------------------------------------
// Regions and observations
// ---------------------------------------------------------------------------

/// Axis-aligned face bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceRegion {
    /// Box area; negative extents count as empty.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// A single detector candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub region: FaceRegion,
    pub landmarks: Option<Landmarks>,
}

/// The face chosen for a frame, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceObservation {
    NotDetected,
    Detected {
        region: FaceRegion,
        landmarks: Option<Landmarks>,
    },
}

impl FaceObservation {
    /// Select the candidate with the largest bounding-box area. Ties keep
    /// the first candidate in detector order.
    pub fn from_candidates(candidates: impl IntoIterator<Item = DetectedFace>) -> Self {
        let mut best: Option<DetectedFace> = None;
        for candidate in candidates {
            let replace = match &best {
                Some(current) => candidate.region.area() > current.region.area(),
                None => true,
            };
            if replace {
                best = Some(candidate);
            }
        }
        match best {
            Some(face) => FaceObservation::Detected {
                region: face.region,
                landmarks: face.landmarks,
            },
            None => FaceObservation::NotDetected,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, FaceObservation::Detected { .. })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of the detection collaborator for a single frame.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// The backend raised an error or returned an unusable response.
    #[error("Detector backend failed: {0}")]
    Backend(String),

    /// The backend did not answer within the configured bound.
    #[error("Detector timed out after {0:?}")]
    TimedOut(Duration),
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Precise detector: face regions with 68-point landmarks.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    async fn detect_landmarks(
        &self,
        image: &GrayImage,
    ) -> Result<Vec<(FaceRegion, Landmarks)>, DetectionError>;
}

/// Coarse detector: face regions only.
#[async_trait]
pub trait RegionDetector: Send + Sync {
    async fn detect_regions(&self, image: &GrayImage) -> Result<Vec<FaceRegion>, DetectionError>;
}

/// Which detector variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Precise,
    Coarse,
}

impl DetectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorKind::Precise => "precise",
            DetectorKind::Coarse => "coarse",
        }
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "precise" | "landmarks" => Ok(DetectorKind::Precise),
            "coarse" | "regions" => Ok(DetectorKind::Coarse),
            other => Err(format!(
                "unknown detector mode '{other}', expected 'precise' or 'coarse'"
            )),
        }
    }
}

/// The detector variant selected at startup.
#[derive(Clone)]
pub enum Detector {
    Precise(Arc<dyn LandmarkDetector>),
    Coarse(Arc<dyn RegionDetector>),
}

impl Detector {
    pub fn kind(&self) -> DetectorKind {
        match self {
            Detector::Precise(_) => DetectorKind::Precise,
            Detector::Coarse(_) => DetectorKind::Coarse,
        }
    }

    /// Run detection and select the primary face.
    pub async fn observe(&self, image: &GrayImage) -> Result<FaceObservation, DetectionError> {
        let candidates: Vec<DetectedFace> = match self {
            Detector::Precise(detector) => detector
                .detect_landmarks(image)
                .await?
                .into_iter()
                .map(|(region, landmarks)| DetectedFace {
                    region,
                    landmarks: Some(landmarks),
                })
                .collect(),
            Detector::Coarse(detector) => detector
                .detect_regions(image)
                .await?
                .into_iter()
                .map(|region| DetectedFace {
                    region,
                    landmarks: None,
                })
                .collect(),
        };
        tracing::debug!(faces = candidates.len(), kind = self.kind().as_str(), "Faces detected");
        Ok(FaceObservation::from_candidates(candidates))
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Detector").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::fixtures::face;

    fn region(x: f64, w: f64, h: f64) -> FaceRegion {
        FaceRegion {
            x,
            y: 0.0,
            width: w,
            height: h,
        }
    }

    fn candidate(x: f64, w: f64, h: f64) -> DetectedFace {
        DetectedFace {
            region: region(x, w, h),
            landmarks: None,
        }
    }

    struct FixedRegions(Vec<FaceRegion>);

    #[async_trait]
    impl RegionDetector for FixedRegions {
        async fn detect_regions(&self, _: &GrayImage) -> Result<Vec<FaceRegion>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    struct FixedLandmarks;

    #[async_trait]
    impl LandmarkDetector for FixedLandmarks {
        async fn detect_landmarks(
            &self,
            _: &GrayImage,
        ) -> Result<Vec<(FaceRegion, Landmarks)>, DetectionError> {
            Ok(vec![(region(0.0, 10.0, 10.0), face(2.0, 0.0))])
        }
    }

    struct Failing;

    #[async_trait]
    impl RegionDetector for Failing {
        async fn detect_regions(&self, _: &GrayImage) -> Result<Vec<FaceRegion>, DetectionError> {
            Err(DetectionError::Backend("boom".into()))
        }
    }

    #[test]
    fn no_candidates_is_not_detected() {
        assert_eq!(
            FaceObservation::from_candidates(Vec::new()),
            FaceObservation::NotDetected
        );
    }

    #[test]
    fn largest_area_wins() {
        let obs = FaceObservation::from_candidates(vec![
            candidate(0.0, 10.0, 10.0),
            candidate(1.0, 30.0, 20.0),
            candidate(2.0, 20.0, 20.0),
        ]);
        assert_eq!(
            obs,
            FaceObservation::Detected {
                region: region(1.0, 30.0, 20.0),
                landmarks: None
            }
        );
    }

    #[test]
    fn ties_keep_first_seen() {
        let obs = FaceObservation::from_candidates(vec![
            candidate(5.0, 10.0, 20.0),
            candidate(6.0, 20.0, 10.0),
        ]);
        match obs {
            FaceObservation::Detected { region, .. } => assert_eq!(region.x, 5.0),
            FaceObservation::NotDetected => panic!("expected a face"),
        }
    }

    #[test]
    fn negative_extent_has_zero_area() {
        assert_eq!(region(0.0, -5.0, 10.0).area(), 0.0);
    }

    #[test]
    fn detector_kind_parses() {
        assert_eq!("precise".parse::<DetectorKind>(), Ok(DetectorKind::Precise));
        assert_eq!(" Coarse ".parse::<DetectorKind>(), Ok(DetectorKind::Coarse));
        assert!("dlib".parse::<DetectorKind>().is_err());
    }

    #[tokio::test]
    async fn coarse_observation_has_no_landmarks() {
        let detector = Detector::Coarse(Arc::new(FixedRegions(vec![region(0.0, 4.0, 4.0)])));
        let obs = detector.observe(&GrayImage::new(8, 8)).await.unwrap();
        assert_eq!(detector.kind(), DetectorKind::Coarse);
        assert_eq!(
            obs,
            FaceObservation::Detected {
                region: region(0.0, 4.0, 4.0),
                landmarks: None
            }
        );
    }

    #[tokio::test]
    async fn precise_observation_carries_landmarks() {
        let detector = Detector::Precise(Arc::new(FixedLandmarks));
        let obs = detector.observe(&GrayImage::new(8, 8)).await.unwrap();
        assert!(matches!(
            obs,
            FaceObservation::Detected {
                landmarks: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let detector = Detector::Coarse(Arc::new(Failing));
        let err = detector.observe(&GrayImage::new(8, 8)).await.unwrap_err();
        assert!(matches!(err, DetectionError::Backend(_)));
    }
}
