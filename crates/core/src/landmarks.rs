//! 68-point facial landmark layout.
//!
//! Points follow the iBUG 300-W annotation order used by common landmark
//! predictors. "Left" and "right" are from the viewer's side of the image.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::geometry::{centroid, eye_aspect_ratio, Point};

/// Number of points in a full landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// Named anatomical regions of the 68-point layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacialRegion {
    Jaw,
    RightBrow,
    LeftBrow,
    Nose,
    LeftEye,
    RightEye,
    Mouth,
}

impl FacialRegion {
    /// Index range of this region inside a landmark set.
    pub fn range(self) -> Range<usize> {
        match self {
            FacialRegion::Jaw => 0..17,
            FacialRegion::RightBrow => 17..22,
            FacialRegion::LeftBrow => 22..27,
            FacialRegion::Nose => 27..36,
            FacialRegion::LeftEye => 36..42,
            FacialRegion::RightEye => 42..48,
            FacialRegion::Mouth => 48..68,
        }
    }
}

/// Error returned when a point list is not a full landmark set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {LANDMARK_COUNT} landmark points, got {0}")]
pub struct LandmarkCountError(pub usize);

/// A complete, ordered 68-point landmark set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks(Vec<Point>);

impl Landmarks {
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn region(&self, region: FacialRegion) -> &[Point] {
        &self.0[region.range()]
    }

    pub fn left_eye(&self) -> [Point; 6] {
        self.eye(FacialRegion::LeftEye)
    }

    pub fn right_eye(&self) -> [Point; 6] {
        self.eye(FacialRegion::RightEye)
    }

    /// Mean EAR of both eyes.
    pub fn mean_eye_aspect_ratio(&self) -> f64 {
        (eye_aspect_ratio(&self.left_eye()) + eye_aspect_ratio(&self.right_eye())) / 2.0
    }

    /// Centers of the left and right eye contours.
    pub fn eye_centers(&self) -> (Point, Point) {
        (
            centroid(self.region(FacialRegion::LeftEye)),
            centroid(self.region(FacialRegion::RightEye)),
        )
    }

    fn eye(&self, region: FacialRegion) -> [Point; 6] {
        let pts = self.region(region);
        [pts[0], pts[1], pts[2], pts[3], pts[4], pts[5]]
    }
}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = LandmarkCountError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        if points.len() == LANDMARK_COUNT {
            Ok(Self(points))
        } else {
            Err(LandmarkCountError(points.len()))
        }
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.0
    }
}
