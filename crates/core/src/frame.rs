//! Inbound frame payloads and decoding.
//!
//! Browsers usually send frames as `canvas.toDataURL()` strings
//! (`data:image/jpeg;base64,<payload>`), sometimes with the padding
//! stripped. Binary WebSocket messages carry the encoded image bytes
//! directly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;

use crate::detection::DetectionError;
use crate::types::Timestamp;

/// An encoded frame as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Base64 text, optionally prefixed by a format header ending in `,`.
    Text(String),
    /// Raw encoded image bytes (PNG, JPEG, WebP).
    Binary(Vec<u8>),
}

/// A decoded pixel grid with its capture time.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub pixels: DynamicImage,
    pub captured_at: Timestamp,
}

impl RawFrame {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Per-frame failures. These never leave the analyzer; they are collapsed
/// into degraded metrics.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Could not decode frame: {0}")]
    Decode(String),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("Frame worker failed: {0}")]
    Worker(String),
}

/// Extract the base64 body of a text payload and decode it.
///
/// Everything up to and including the first `,` is treated as a format
/// header and discarded. Missing `=` padding is restored.
pub fn decode_text_payload(payload: &str) -> Result<Vec<u8>, FrameError> {
    let body = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };
    let mut body: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if body.is_empty() {
        return Err(FrameError::Decode("empty payload".into()));
    }

    let missing = body.len() % 4;
    if missing != 0 {
        body.extend(std::iter::repeat('=').take(4 - missing));
    }

    BASE64
        .decode(body.as_bytes())
        .map_err(|e| FrameError::Decode(format!("invalid base64: {e}")))
}

/// Decode a payload into a pixel grid stamped with the current time.
pub fn decode_frame(payload: &FramePayload) -> Result<RawFrame, FrameError> {
    let bytes = match payload {
        FramePayload::Text(text) => decode_text_payload(text)?,
        FramePayload::Binary(bytes) => bytes.clone(),
    };
    decode_image_bytes(&bytes)
}

fn decode_image_bytes(bytes: &[u8]) -> Result<RawFrame, FrameError> {
    let pixels = image::load_from_memory(bytes)
        .map_err(|e| FrameError::Decode(format!("unsupported image data: {e}")))?;
    Ok(RawFrame {
        pixels,
        captured_at: chrono::Utc::now(),
    })
}

/// Test helpers for building encoded frames.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    use image::{GrayImage, ImageFormat, Luma};

    use super::*;

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    pub fn data_url(width: u32, height: u32) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(png_bytes(width, height)))
    }
}
