//! Per-connection serving task.

use crate::router::EventRouter;
use devlens_protocol::{ClientMessage, ConnectionId, ServerMessage};
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Serve one connection over a pair of message channels.
///
/// Registers the outbound channel, drains inbound messages through the
/// router, and unregisters when the producer hangs up. The transport layer
/// owns the channel ends; this task never touches sockets.
pub fn spawn_connection(
    router: Arc<EventRouter>,
    mut inbound: UnboundedReceiver<ClientMessage>,
    outbound: UnboundedSender<ServerMessage>,
) -> (ConnectionId, JoinHandle<()>) {
    let connection_id = router.connect(outbound);
    let handle = tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            router.handle_message(connection_id, message).await;
        }
        debug!("connection closed (connection_id={connection_id})");
        router.disconnect(connection_id);
    });
    (connection_id, handle)
}
