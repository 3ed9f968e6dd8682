use std::net::SocketAddr;
use std::sync::Arc;

use attention_core::analyzer::FrameAnalyzer;
use attention_core::manager::SessionManager;
use attention_core::store::{MemoryStore, SessionStore};
use attention_db::store::PgSessionStore;
use attention_detector::config::{build_detector, DetectorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attention_api::config::{analyzer_config_from_env, ServerConfig};
use attention_api::router::build_app_router;
use attention_api::state::AppState;
use attention_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "attention_api=debug,attention_core=info,attention_detector=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let analyzer_config = analyzer_config_from_env();
    tracing::info!(
        ear_threshold = analyzer_config.thresholds.ear_threshold,
        angle_max_degrees = analyzer_config.thresholds.angle_max_degrees,
        detection_timeout_ms = analyzer_config.detection_timeout.as_millis() as u64,
        "Loaded analyzer configuration"
    );

    // --- Session store ---
    let store: Arc<dyn SessionStore> = match &config.database_url {
        Some(database_url) => {
            let pool = attention_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            attention_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            attention_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgSessionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, finished sessions are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Detector + analyzer ---
    let detector = build_detector(&DetectorConfig::from_env());
    let analyzer = Arc::new(FrameAnalyzer::new(detector, analyzer_config));

    // --- Session manager ---
    let sessions = Arc::new(SessionManager::new(analyzer, store));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- App state ---
    let state = AppState {
        sessions: Arc::clone(&sessions),
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    let unfinished = sessions.active_count().await;
    if unfinished > 0 {
        tracing::warn!(unfinished, "Shutting down with sessions that were never ended");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
