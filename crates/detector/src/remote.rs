//! Detector capability implementations over [`DetectorApi`].

use async_trait::async_trait;
use attention_core::detection::{DetectionError, FaceRegion, LandmarkDetector, RegionDetector};
use attention_core::landmarks::Landmarks;
use image::GrayImage;

use crate::api::{DetectResponse, DetectorApi, DetectorApiError};

impl From<DetectorApiError> for DetectionError {
    fn from(err: DetectorApiError) -> Self {
        DetectionError::Backend(err.to_string())
    }
}

/// Precise variant: every face must carry a full landmark set.
#[derive(Debug, Clone)]
pub struct RemoteLandmarkDetector {
    api: DetectorApi,
}

impl RemoteLandmarkDetector {
    pub fn new(api: DetectorApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl LandmarkDetector for RemoteLandmarkDetector {
    async fn detect_landmarks(
        &self,
        image: &GrayImage,
    ) -> Result<Vec<(FaceRegion, Landmarks)>, DetectionError> {
        let response = self.api.detect(image, true).await?;
        landmark_faces(response)
    }
}

/// Coarse variant: bounding boxes only.
#[derive(Debug, Clone)]
pub struct RemoteRegionDetector {
    api: DetectorApi,
}

impl RemoteRegionDetector {
    pub fn new(api: DetectorApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RegionDetector for RemoteRegionDetector {
    async fn detect_regions(&self, image: &GrayImage) -> Result<Vec<FaceRegion>, DetectionError> {
        let response = self.api.detect(image, false).await?;
        Ok(response.faces.iter().map(|f| f.region()).collect())
    }
}

/// Convert a landmark-mode response, rejecting faces without a valid set.
pub fn landmark_faces(
    response: DetectResponse,
) -> Result<Vec<(FaceRegion, Landmarks)>, DetectionError> {
    response
        .faces
        .iter()
        .map(|face| match face.landmarks() {
            Ok(Some(landmarks)) => Ok((face.region(), landmarks)),
            Ok(None) => Err(DetectionError::Backend(
                "face returned without landmarks in landmark mode".into(),
            )),
            Err(e) => Err(DetectionError::Backend(e.to_string())),
        })
        .collect()
}
