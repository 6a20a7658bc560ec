//! Periodic session snapshots for monitor connections.

use crate::registry::SessionRegistry;
use devlens_protocol::ServerMessage;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Push session snapshots to every monitor connection on a fixed interval.
///
/// Runs until aborted. Ticks with no monitor connections are skipped.
pub fn spawn_session_monitor(
    registry: Arc<SessionRegistry>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let delivered = registry.broadcast_monitors(&ServerMessage::SessionsUpdate {
                data: registry.snapshot(),
            });
            if delivered > 0 {
                debug!("session snapshot pushed (monitors={delivered})");
            }
        }
    })
}
