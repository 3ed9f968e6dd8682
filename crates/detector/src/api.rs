//! REST client for the face detection service.
//!
//! The service accepts a PNG-encoded grayscale frame on `POST /detect` and
//! answers with every face it found:
//!
//! ```json
//! { "faces": [ { "x": 10, "y": 12, "width": 80, "height": 96,
//!                "landmarks": [[31.0, 40.5], ...] } ] }
//! ```
//!
//! `landmarks` is requested with `?landmarks=true` and, when present, holds
//! 68 `[x, y]` pairs in the standard facial-landmark order.

use std::io::Cursor;

use attention_core::detection::FaceRegion;
use attention_core::geometry::Point;
use attention_core::landmarks::{LandmarkCountError, Landmarks};
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};

/// HTTP client for a single detection service instance.
#[derive(Debug, Clone)]
pub struct DetectorApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of a successful `/detect` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub faces: Vec<FaceDto>,
}

/// One face as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDto {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<[f64; 2]>>,
}

impl FaceDto {
    pub fn region(&self) -> FaceRegion {
        FaceRegion {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// The landmark set, if the service sent one.
    ///
    /// A point list of the wrong length is an error rather than `None`.
    pub fn landmarks(&self) -> Result<Option<Landmarks>, LandmarkCountError> {
        match &self.landmarks {
            None => Ok(None),
            Some(pairs) => {
                let points: Vec<Point> = pairs.iter().map(|[x, y]| Point::new(*x, *y)).collect();
                Landmarks::try_from(points).map(Some)
            }
        }
    }
}

/// Errors from the detection REST layer.
#[derive(Debug, thiserror::Error)]
pub enum DetectorApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Detector API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The frame could not be encoded for upload.
    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

impl DetectorApi {
    /// Create a client for the service at `api_url`, e.g. `http://host:8500`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send one frame for detection.
    pub async fn detect(
        &self,
        image: &GrayImage,
        with_landmarks: bool,
    ) -> Result<DetectResponse, DetectorApiError> {
        let body = encode_png(image)?;

        let response = self
            .client
            .post(format!("{}/detect?landmarks={with_landmarks}", self.api_url))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json::<DetectResponse>().await?)
    }

    /// `GET /health` on the service.
    pub async fn health(&self) -> Result<(), DetectorApiError> {
        let response = self
            .client
            .get(format!("{}/health", self.api_url))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DetectorApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DetectorApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Encode a grayscale frame as PNG.
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, DetectorApiError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| DetectorApiError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(n: usize) -> Vec<[f64; 2]> {
        (0..n).map(|i| [i as f64, (i * 2) as f64]).collect()
    }

    #[test]
    fn parses_response_with_and_without_landmarks() {
        let json = serde_json::json!({
            "faces": [
                { "x": 1.0, "y": 2.0, "width": 30.0, "height": 40.0, "landmarks": pairs(68) },
                { "x": 5.0, "y": 6.0, "width": 10.0, "height": 10.0 }
            ]
        });
        let response: DetectResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.faces.len(), 2);

        let first = &response.faces[0];
        assert_eq!(first.region().area(), 1200.0);
        let landmarks = first.landmarks().unwrap().unwrap();
        assert_eq!(landmarks.points()[3], Point::new(3.0, 6.0));

        assert_eq!(response.faces[1].landmarks().unwrap(), None);
    }

    #[test]
    fn missing_faces_field_means_no_faces() {
        let response: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(response.faces.is_empty());
    }

    #[test]
    fn short_landmark_list_is_rejected() {
        let face = FaceDto {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            landmarks: Some(pairs(5)),
        };
        assert_eq!(face.landmarks(), Err(LandmarkCountError(5)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = DetectorApi::new("http://localhost:8500/");
        assert_eq!(api.api_url(), "http://localhost:8500");
    }

    #[test]
    fn encodes_png() {
        let bytes = encode_png(&GrayImage::new(4, 3)).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
