#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use attention_api::config::ServerConfig;
use attention_api::router::build_app_router;
use attention_api::state::AppState;
use attention_api::ws::WsManager;
use attention_core::analyzer::{AnalyzerConfig, FrameAnalyzer};
use attention_core::classifier::FrameMetrics;
use attention_core::detection::{DetectionError, Detector, FaceRegion, LandmarkDetector};
use attention_core::geometry::Point;
use attention_core::landmarks::Landmarks;
use attention_core::manager::SessionManager;
use attention_core::session::SessionSummary;
use attention_core::store::{MemoryStore, SessionStore, StoreError};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use image::{GrayImage, ImageFormat, Luma};
use serde_json::Value;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

/// Detector that always finds one level face with eyes of the given height.
///
/// Eye width is 4px, so the reported EAR is `eye_height / 4`.
pub struct StubDetector {
    pub eye_height: f64,
}

#[async_trait]
impl LandmarkDetector for StubDetector {
    async fn detect_landmarks(
        &self,
        _: &GrayImage,
    ) -> Result<Vec<(FaceRegion, Landmarks)>, DetectionError> {
        let region = FaceRegion {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
        };
        Ok(vec![(region, face_landmarks(self.eye_height))])
    }
}

fn face_landmarks(eye_height: f64) -> Landmarks {
    let mut points = vec![Point::new(25.0, 40.0); 68];
    let half = eye_height / 2.0;
    for (start, ox) in [(36, 10.0), (42, 30.0)] {
        let oy = 20.0;
        let eye = [
            Point::new(ox, oy),
            Point::new(ox + 1.0, oy - half),
            Point::new(ox + 3.0, oy - half),
            Point::new(ox + 4.0, oy),
            Point::new(ox + 3.0, oy + half),
            Point::new(ox + 1.0, oy + half),
        ];
        points[start..start + 6].copy_from_slice(&eye);
    }
    Landmarks::try_from(points).expect("68 points")
}

/// Store whose backend is always down.
pub struct UnavailableStore;

#[async_trait]
impl SessionStore for UnavailableStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn save(
        &self,
        _: &SessionSummary,
        _: &[FrameMetrics],
        _: Option<&str>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn recent_for_child(
        &self,
        _: &str,
        _: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        stats_every_n_frames: 1,
        database_url: None,
    }
}

/// State with open-eyed faces and an in-memory store.
pub fn test_state() -> AppState {
    test_state_with(Arc::new(MemoryStore::new()), test_config())
}

pub fn test_state_with(store: Arc<dyn SessionStore>, config: ServerConfig) -> AppState {
    let detector = Detector::Precise(Arc::new(StubDetector { eye_height: 1.6 }));
    let analyzer = Arc::new(FrameAnalyzer::new(detector, AnalyzerConfig::default()));
    AppState {
        sessions: Arc::new(SessionManager::new(analyzer, store)),
        config: Arc::new(config),
        ws_manager: Arc::new(WsManager::new()),
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    let config = state.config.as_ref().clone();
    build_app_router(state, &config)
}

/// Serve the app on an ephemeral local port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = build_test_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn start_body(child_id: &str) -> Value {
    serde_json::json!({
        "child_id": child_id,
        "module_id": "phonics-3",
        "video_url": "https://videos.example/phonics-3.mp4",
        "video_duration_seconds": 240,
    })
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A small gradient PNG.
pub fn frame_png(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// The same frame as a `data:` URL, as browsers send it.
pub fn frame_data_url(width: u32, height: u32) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(frame_png(width, height)))
}
