//! Presence registry and fan-out router.
//!
//! Tracks which member identities are reachable over which live socket
//! connections and routes server-initiated events to them. All sends are
//! fire-and-forget: a closed connection is logged and skipped, never
//! surfaced to the caller.

use crate::websocket::WsEvent;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// All routing state behind one lock so connect/identify/disconnect
/// callbacks interleave safely.
#[derive(Default)]
struct RouterInner {
    /// Live connections and their outbound channels
    connections: HashMap<ConnectionId, UnboundedSender<WsEvent>>,
    /// Identity bindings in insertion order. Keys are unique: re-identify
    /// overwrites the connection in place (last writer wins).
    identities: Vec<(String, ConnectionId)>,
    /// Named groups (lesson management rooms)
    groups: HashMap<String, Vec<ConnectionId>>,
}

pub struct PresenceRouter {
    inner: RwLock<RouterInner>,
}

impl PresenceRouter {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RouterInner::default()),
        }
    }

    /// Register a connection's outbound channel before any identify arrives
    pub async fn register_connection(&self, conn_id: ConnectionId, sender: UnboundedSender<WsEvent>) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(conn_id, sender);
        debug!("Connection {} registered", conn_id);
    }

    /// Bind an identity to a connection. Re-identifying an existing identity
    /// moves it onto the new connection.
    pub async fn identify(&self, identity: &str, conn_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.identities.iter_mut().find(|(id, _)| id == identity) {
            entry.1 = conn_id;
        } else {
            inner.identities.push((identity.to_string(), conn_id));
        }
        debug!("Identity '{}' bound to connection {}", identity, conn_id);
    }

    /// The connection currently bound to an identity
    pub async fn lookup(&self, identity: &str) -> Option<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .identities
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, conn)| *conn)
    }

    /// Disconnect cleanup: drop the connection, the first identity bound to
    /// it, and its group memberships. Only the first matching identity is
    /// removed; any later binding to the same connection survives.
    pub async fn remove(&self, conn_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&conn_id);
        if let Some(position) = inner.identities.iter().position(|(_, conn)| *conn == conn_id) {
            let (identity, _) = inner.identities.remove(position);
            debug!("Identity '{}' removed with connection {}", identity, conn_id);
        }
        for members in inner.groups.values_mut() {
            members.retain(|member| *member != conn_id);
        }
    }

    /// Add a connection to a named group
    pub async fn join_group(&self, group: &str, conn_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        let members = inner.groups.entry(group.to_string()).or_default();
        if !members.contains(&conn_id) {
            members.push(conn_id);
        }
        debug!("Connection {} joined group '{}'", conn_id, group);
    }

    /// Send an event to every live connection
    pub async fn broadcast_all(&self, event: WsEvent) {
        let inner = self.inner.read().await;
        for (conn_id, sender) in &inner.connections {
            if sender.send(event.clone()).is_err() {
                warn!("Dropping broadcast to closed connection {}", conn_id);
            }
        }
    }

    /// Send an event to the connection bound to an identity. Returns whether
    /// a live connection accepted it.
    pub async fn send_to(&self, identity: &str, event: WsEvent) -> bool {
        let inner = self.inner.read().await;
        let Some((_, conn_id)) = inner.identities.iter().find(|(id, _)| id == identity) else {
            return false;
        };
        match inner.connections.get(conn_id) {
            Some(sender) => {
                if sender.send(event).is_err() {
                    warn!(
                        "Dropping send to '{}': connection {} closed",
                        identity, conn_id
                    );
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Send an event to every connection in a group
    pub async fn send_to_group(&self, group: &str, event: WsEvent) {
        let inner = self.inner.read().await;
        let Some(members) = inner.groups.get(group) else {
            return;
        };
        for conn_id in members {
            match inner.connections.get(conn_id) {
                Some(sender) => {
                    if sender.send(event.clone()).is_err() {
                        warn!(
                            "Dropping group send to closed connection {} in '{}'",
                            conn_id, group
                        );
                    }
                }
                None => {
                    warn!("Group '{}' holds stale connection {}", group, conn_id);
                }
            }
        }
    }

    /// Drop all routing state
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.connections.clear();
        inner.identities.clear();
        inner.groups.clear();
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Number of bound identities
    pub async fn identified_count(&self) -> usize {
        self.inner.read().await.identities.len()
    }
}

impl Default for PresenceRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn identify_lookup_remove_cycle() {
        let router = PresenceRouter::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();

        router.register_connection(conn, tx).await;
        router.identify("amy", conn).await;
        assert_eq!(router.lookup("amy").await, Some(conn));
        assert_eq!(router.identified_count().await, 1);

        router.remove(conn).await;
        assert_eq!(router.lookup("amy").await, None);
        assert_eq!(router.connection_count().await, 0);
    }

    #[tokio::test]
    async fn reidentify_overwrites_binding() {
        let router = PresenceRouter::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        router.register_connection(first, tx_a).await;
        router.register_connection(second, tx_b).await;
        router.identify("amy", first).await;
        router.identify("amy", second).await;

        assert_eq!(router.lookup("amy").await, Some(second));
        assert_eq!(router.identified_count().await, 1);
    }

    #[tokio::test]
    async fn remove_deletes_only_first_match() {
        let router = PresenceRouter::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();

        router.register_connection(conn, tx).await;
        // Two identities bound to one connection: only the first goes away
        router.identify("amy", conn).await;
        router.identify("amy-tablet", conn).await;

        router.remove(conn).await;
        assert_eq!(router.lookup("amy").await, None);
        assert_eq!(router.lookup("amy-tablet").await, Some(conn));
    }

    #[tokio::test]
    async fn send_to_unknown_identity_is_false() {
        let router = PresenceRouter::new();
        assert!(
            !router
                .send_to("nobody", WsEvent::LessonManagementRefresh)
                .await
        );
    }

    #[tokio::test]
    async fn group_send_reaches_members_only() {
        let router = PresenceRouter::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();

        router.register_connection(member, tx_a).await;
        router.register_connection(outsider, tx_b).await;
        router.join_group("lessonManagement-Ms. Frizzle", member).await;

        router
            .send_to_group(
                "lessonManagement-Ms. Frizzle",
                WsEvent::LessonManagementRefresh,
            )
            .await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
