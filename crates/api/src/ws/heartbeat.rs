use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::ws::manager::WsManager;

/// Interval between keep-alive pings on open frame streams.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the keep-alive task for frame streams.
///
/// Pings every open connection each [`HEARTBEAT_INTERVAL`]; idle ticks with
/// no connections are skipped. The handle is aborted on shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + HEARTBEAT_INTERVAL;
        let mut interval = tokio::time::interval_at(start, HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let count = ws_manager.connection_count().await;
            if count == 0 {
                continue;
            }
            tracing::debug!(count, "Pinging frame streams");
            ws_manager.ping_all().await;
        }
    })
}

