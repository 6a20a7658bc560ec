//! Live connection registry with session-scoped fan-out.

use devlens_protocol::{
    ConnectionId, ConnectionInfo, ConnectionMeta, ServerMessage, SessionId, SessionSnapshot,
};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Outbound handle for one connection.
pub type ConnectionSender = UnboundedSender<ServerMessage>;

struct ConnectionEntry {
    meta: ConnectionMeta,
    sender: ConnectionSender,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    sessions: HashMap<SessionId, HashSet<ConnectionId>>,
    monitors: HashSet<ConnectionId>,
}

/// Tracks live connections, their session bindings, and monitor observers.
///
/// Fan-out snapshots the recipient list before sending, so a send never
/// holds the registry lock. Connections whose channel has closed are pruned
/// on the next delivery attempt.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id.
    pub fn register(&self, sender: ConnectionSender) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        let mut inner = self.inner.write();
        inner.connections.insert(
            connection_id,
            ConnectionEntry {
                meta: ConnectionMeta::default(),
                sender,
            },
        );
        info!("connection registered (connection_id={connection_id})");
        connection_id
    }

    /// Bind a connection to a session with its reported metadata.
    ///
    /// Rebinding moves the connection out of its previous session group.
    /// Binding an unknown connection is a no-op.
    pub fn bind(&self, connection_id: ConnectionId, meta: ConnectionMeta) {
        let mut inner = self.inner.write();
        if !inner.connections.contains_key(&connection_id) {
            warn!("bind for unknown connection (connection_id={connection_id})");
            return;
        }
        let previous = inner
            .connections
            .get(&connection_id)
            .and_then(|entry| entry.meta.session_id.clone());
        if let Some(previous) = previous {
            remove_from_session(&mut inner, &previous, connection_id);
        }
        if let Some(session_id) = meta.session_id.clone() {
            inner
                .sessions
                .entry(session_id.clone())
                .or_default()
                .insert(connection_id);
            debug!("connection bound (connection_id={connection_id}, session_id={session_id})");
        }
        if let Some(entry) = inner.connections.get_mut(&connection_id) {
            entry.meta = meta;
        }
    }

    /// Flag a connection as a monitor observer.
    pub fn mark_monitor(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write();
        if inner.connections.contains_key(&connection_id) {
            inner.monitors.insert(connection_id);
            debug!("connection marked as monitor (connection_id={connection_id})");
        }
    }

    /// Remove a connection from all session groups and the monitor set.
    ///
    /// Idempotent: removing an unknown connection changes nothing.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write();
        let entry = inner.connections.remove(&connection_id);
        inner.monitors.remove(&connection_id);
        if let Some(entry) = entry {
            if let Some(session_id) = entry.meta.session_id {
                remove_from_session(&mut inner, &session_id, connection_id);
            }
            info!("connection unregistered (connection_id={connection_id})");
        }
    }

    /// Session a connection is bound to, if any.
    pub fn session_of(&self, connection_id: ConnectionId) -> Option<SessionId> {
        self.inner
            .read()
            .connections
            .get(&connection_id)
            .and_then(|entry| entry.meta.session_id.clone())
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Send a message to one connection, pruning it when the channel is gone.
    pub fn send_to(&self, connection_id: ConnectionId, message: ServerMessage) -> bool {
        let sender = self
            .inner
            .read()
            .connections
            .get(&connection_id)
            .map(|entry| entry.sender.clone());
        match sender {
            Some(sender) if sender.send(message).is_ok() => true,
            Some(_) => {
                self.unregister(connection_id);
                false
            }
            None => false,
        }
    }

    /// Broadcast a message to every connection bound to a session.
    ///
    /// Returns the delivery count. Dead connections found along the way are
    /// unregistered, so one stale observer never blocks the rest.
    pub fn broadcast(&self, session_id: &str, message: &ServerMessage) -> usize {
        let targets = self.session_senders(session_id);
        self.deliver(targets, message)
    }

    /// Broadcast a message to every monitor connection.
    pub fn broadcast_monitors(&self, message: &ServerMessage) -> usize {
        let targets: Vec<(ConnectionId, ConnectionSender)> = {
            let inner = self.inner.read();
            inner
                .monitors
                .iter()
                .filter_map(|id| {
                    inner
                        .connections
                        .get(id)
                        .map(|entry| (*id, entry.sender.clone()))
                })
                .collect()
        };
        self.deliver(targets, message)
    }

    /// Snapshot all sessions and their live connections, ordered by id.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let inner = self.inner.read();
        let mut snapshots: Vec<SessionSnapshot> = inner
            .sessions
            .iter()
            .map(|(session_id, members)| {
                let mut connections: Vec<ConnectionInfo> = members
                    .iter()
                    .filter_map(|id| {
                        inner.connections.get(id).map(|entry| ConnectionInfo {
                            connection_id: *id,
                            source: entry.meta.source.clone(),
                            url: entry.meta.url.clone(),
                            workspace: entry.meta.workspace.clone(),
                        })
                    })
                    .collect();
                connections.sort_by_key(|info| info.connection_id);
                SessionSnapshot {
                    id: session_id.clone(),
                    connections,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    fn session_senders(&self, session_id: &str) -> Vec<(ConnectionId, ConnectionSender)> {
        let inner = self.inner.read();
        inner
            .sessions
            .get(session_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| {
                        inner
                            .connections
                            .get(id)
                            .map(|entry| (*id, entry.sender.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn deliver(
        &self,
        targets: Vec<(ConnectionId, ConnectionSender)>,
        message: &ServerMessage,
    ) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (connection_id, sender) in targets {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(connection_id);
            }
        }
        for connection_id in dead {
            warn!("pruning dead connection (connection_id={connection_id})");
            self.unregister(connection_id);
        }
        delivered
    }
}

fn remove_from_session(inner: &mut RegistryInner, session_id: &str, connection_id: ConnectionId) {
    if let Some(members) = inner.sessions.get_mut(session_id) {
        members.remove(&connection_id);
        if members.is_empty() {
            inner.sessions.remove(session_id);
        }
    }
}
