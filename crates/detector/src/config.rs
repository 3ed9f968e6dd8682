use std::sync::Arc;

use attention_core::detection::{Detector, DetectorKind};

use crate::api::DetectorApi;
use crate::remote::{RemoteLandmarkDetector, RemoteRegionDetector};

/// Detection service configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Base URL of the detection service (default: `http://localhost:8500`).
    pub url: String,
    /// Variant used for the lifetime of the process (default: `precise`).
    pub mode: DetectorKind,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8500".into(),
            mode: DetectorKind::Precise,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var         | Default                  |
    /// |-----------------|--------------------------|
    /// | `DETECTOR_URL`  | `http://localhost:8500`  |
    /// | `DETECTOR_MODE` | `precise`                |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("DETECTOR_URL").unwrap_or(defaults.url);

        let mode = match std::env::var("DETECTOR_MODE") {
            Ok(raw) => raw
                .parse()
                .unwrap_or_else(|e: String| panic!("DETECTOR_MODE is invalid: {e}")),
            Err(_) => defaults.mode,
        };

        Self { url, mode }
    }
}

/// Build the detector variant named by `config`.
pub fn build_detector(config: &DetectorConfig) -> Detector {
    let api = DetectorApi::new(config.url.clone());
    tracing::info!(url = %api.api_url(), mode = config.mode.as_str(), "Configured face detector");
    match config.mode {
        DetectorKind::Precise => Detector::Precise(Arc::new(RemoteLandmarkDetector::new(api))),
        DetectorKind::Coarse => Detector::Coarse(Arc::new(RemoteRegionDetector::new(api))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_requested_variant() {
        let precise = build_detector(&DetectorConfig::default());
        assert_eq!(precise.kind(), DetectorKind::Precise);

        let coarse = build_detector(&DetectorConfig {
            mode: DetectorKind::Coarse,
            ..DetectorConfig::default()
        });
        assert_eq!(coarse.kind(), DetectorKind::Coarse);
    }
}
