use std::str::FromStr;
use std::time::Duration;

use attention_core::analyzer::{AnalyzerConfig, DEFAULT_DETECTION_TIMEOUT};
use attention_core::classifier::Thresholds;
use attention_core::enhance::ClaheParams;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Push a `session_stats` message every N frames (default: `1`).
    pub stats_every_n_frames: u64,
    /// PostgreSQL URL. Without it finished sessions are kept in memory.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `STATS_EVERY_N_FRAMES` | `1`                        |
    /// | `DATABASE_URL`         | unset (in-memory store)    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = parse_env("PORT", 8000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 30);

        let stats_every_n_frames: u64 = parse_env("STATS_EVERY_N_FRAMES", 1);
        assert!(
            stats_every_n_frames > 0,
            "STATS_EVERY_N_FRAMES must be at least 1"
        );

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            stats_every_n_frames,
            database_url,
        }
    }

    /// Whether `CORS_ORIGINS` is the wildcard.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Load analyzer tuning from environment variables with defaults.
///
/// | Env Var                | Default |
/// |------------------------|---------|
/// | `EAR_THRESHOLD`        | `0.23`  |
/// | `ANGLE_MAX_DEGREES`    | `20`    |
/// | `FALLBACK_EAR`         | `0.3`   |
/// | `CLAHE_CLIP_LIMIT`     | `3.0`   |
/// | `CLAHE_TILES`          | `8`     |
/// | `DETECTION_TIMEOUT_MS` | `2000`  |
pub fn analyzer_config_from_env() -> AnalyzerConfig {
    let defaults = Thresholds::default();
    let thresholds = Thresholds {
        ear_threshold: parse_env("EAR_THRESHOLD", defaults.ear_threshold),
        angle_max_degrees: parse_env("ANGLE_MAX_DEGREES", defaults.angle_max_degrees),
        fallback_ear: parse_env("FALLBACK_EAR", defaults.fallback_ear),
    };
    thresholds
        .validate()
        .unwrap_or_else(|e| panic!("Invalid attention thresholds: {e}"));

    let clahe_defaults = ClaheParams::default();
    let clip_limit: f64 = parse_env("CLAHE_CLIP_LIMIT", clahe_defaults.clip_limit);
    assert!(clip_limit.is_finite(), "CLAHE_CLIP_LIMIT must be a finite number");
    let tiles: u32 = parse_env("CLAHE_TILES", clahe_defaults.tiles_x);
    assert!(tiles > 0, "CLAHE_TILES must be at least 1");

    let detection_timeout_ms: u64 = parse_env(
        "DETECTION_TIMEOUT_MS",
        DEFAULT_DETECTION_TIMEOUT.as_millis() as u64,
    );

    AnalyzerConfig {
        thresholds,
        clahe: ClaheParams {
            clip_limit,
            tiles_x: tiles,
            tiles_y: tiles,
        },
        detection_timeout: Duration::from_millis(detection_timeout_ms),
    }
}

/// Read and parse an environment variable, panicking on malformed values.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} is invalid ('{raw}'): {e}")),
        Err(_) => default,
    }
}
