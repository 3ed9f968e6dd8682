//! Pure geometric and photometric signals extracted from a single frame.
//!
//! Provides the eye-aspect-ratio (EAR) and head-tilt measurements computed
//! from facial landmarks, and the camera quality score computed from a
//! grayscale pixel grid.

use image::GrayImage;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Intensity standard deviation that earns the full contrast component.
pub const CONTRAST_NORMALIZER: f64 = 64.0;

/// Laplacian variance that earns the full sharpness component.
pub const SHARPNESS_NORMALIZER: f64 = 1000.0;

/// Maximum points contributed by each of contrast and sharpness.
pub const QUALITY_COMPONENT_WEIGHT: f64 = 50.0;

/// Upper bound of the camera quality score.
pub const MAX_QUALITY: f64 = 100.0;

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A 2-D point in image coordinates (pixels, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Mean of a set of points. Returns the origin for an empty slice.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

// ---------------------------------------------------------------------------
// Landmark signals
// ---------------------------------------------------------------------------

/// Eye aspect ratio for six contour points ordered p1..p6 around the eye.
///
/// `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`. Degenerate geometry (zero
/// horizontal extent) yields `0.0`.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f64 {
    let vertical_a = eye[1].distance(eye[5]);
    let vertical_b = eye[2].distance(eye[4]);
    let horizontal = eye[0].distance(eye[3]);
    if horizontal == 0.0 {
        return 0.0;
    }
    (vertical_a + vertical_b) / (2.0 * horizontal)
}

/// Angle of the line joining the two eye centers relative to horizontal.
///
/// Returns `90.0` when both centers share the same x coordinate (this
/// includes identical centers), otherwise `|atan2(dy, dx)|` in degrees,
/// which lies in `[0, 180]`.
pub fn head_tilt_degrees(left_center: Point, right_center: Point) -> f64 {
    let dx = right_center.x - left_center.x;
    let dy = right_center.y - left_center.y;
    if dx == 0.0 {
        return 90.0;
    }
    dy.atan2(dx).to_degrees().abs()
}

// ---------------------------------------------------------------------------
// Image quality
// ---------------------------------------------------------------------------

/// Population standard deviation of pixel intensities.
pub fn intensity_std_dev(gray: &GrayImage) -> f64 {
    let values: Vec<f64> = gray.pixels().map(|p| f64::from(p.0[0])).collect();
    variance(&values).sqrt()
}

/// Population variance of the 4-neighbour Laplacian response.
///
/// Borders are mirrored without repeating the edge pixel (reflect-101), so
/// a uniform image has zero variance.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let at = |x: i64, y: i64| -> f64 {
        let x = reflect_101(x, width);
        let y = reflect_101(y, height);
        f64::from(gray.get_pixel(x, y).0[0])
    };

    let mut responses = Vec::with_capacity((width as usize) * (height as usize));
    for y in 0..i64::from(height) {
        for x in 0..i64::from(width) {
            let response =
                at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            responses.push(response);
        }
    }
    variance(&responses)
}

/// Combine contrast and sharpness into a score clamped to `[0, 100]`.
pub fn quality_score(contrast: f64, sharpness: f64) -> f64 {
    let score = (contrast / CONTRAST_NORMALIZER) * QUALITY_COMPONENT_WEIGHT
        + (sharpness / SHARPNESS_NORMALIZER) * QUALITY_COMPONENT_WEIGHT;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_QUALITY)
}

/// Camera quality score of a grayscale frame in `[0, 100]`.
pub fn camera_quality(gray: &GrayImage) -> f64 {
    quality_score(intensity_std_dev(gray), laplacian_variance(gray))
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

fn reflect_101(i: i64, len: u32) -> u32 {
    let len = i64::from(len);
    if len == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * (len - 1) - i;
    }
    i.clamp(0, len - 1) as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
