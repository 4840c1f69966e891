//! Event fan-out and directed delivery to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use scanhub_rpc::types::RpcEvent;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Manages event delivery to connected clients.
pub struct BroadcastManager {
    /// Connected clients indexed by connection id.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by id.
    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Broadcast an event to all connections.
    pub async fn broadcast_all(&self, event: &RpcEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                warn!(event_type = event.event_type, error = %e, "failed to serialize event");
                return;
            }
        };
        let conns = self.connections.read().await;
        debug!(
            event_type = event.event_type,
            recipients = conns.len(),
            "broadcast event to all"
        );
        for conn in conns.values() {
            if !conn.send(json.clone()) {
                counter!("ws_broadcast_drops_total").increment(1);
                warn!(conn_id = %conn.id, "failed to send event to client");
            }
        }
    }

    /// Send an event to one connection only.
    ///
    /// Returns `false` when no connection with that id exists.
    pub async fn send_to(&self, connection_id: &str, event: &RpcEvent) -> bool {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                warn!(event_type = event.event_type, error = %e, "failed to serialize event");
                return false;
            }
        };
        let conns = self.connections.read().await;
        let Some(conn) = conns.get(connection_id) else {
            return false;
        };
        if !conn.send(json) {
            counter!("ws_broadcast_drops_total").increment(1);
            warn!(conn_id = %conn.id, "failed to send directed event to client");
        }
        true
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ClientConnection::new(id.into(), tx)), rx)
    }

    fn make_event(event_type: &str) -> RpcEvent {
        RpcEvent::new(event_type, Some(serde_json::json!({"x": 1})))
    }

    #[tokio::test]
    async fn add_and_count() {
        let bm = BroadcastManager::new();
        assert_eq!(bm.connection_count().await, 0);
        let (conn, _rx) = make_connection("c1");
        bm.add(conn).await;
        assert_eq!(bm.connection_count().await, 1);
    }

    #[tokio::test]
    async fn remove_connection() {
        let bm = BroadcastManager::new();
        let (conn, _rx) = make_connection("c1");
        bm.add(conn).await;
        bm.remove("c1").await;
        assert_eq!(bm.connection_count().await, 0);
    }

    #[tokio::test]
    async fn remove_nonexistent_connection() {
        let bm = BroadcastManager::new();
        bm.remove("no_such").await;
        assert_eq!(bm.connection_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1");
        let (c2, mut rx2) = make_connection("c2");
        bm.add(c1).await;
        bm.add(c2).await;

        bm.broadcast_all(&make_event("clients_update")).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_to_empty_manager() {
        let bm = BroadcastManager::new();
        // Should not panic
        bm.broadcast_all(&make_event("clients_update")).await;
    }

    #[tokio::test]
    async fn send_to_delivers_to_one_connection_only() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1");
        let (c2, mut rx2) = make_connection("c2");
        bm.add(c1).await;
        bm.add(c2).await;

        let delivered = bm.send_to("c1", &make_event("scan_file")).await;
        assert!(delivered);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_returns_false() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1");
        bm.add(c1).await;

        let delivered = bm.send_to("ghost", &make_event("scan_file")).await;
        assert!(!delivered);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_event_is_valid_json() {
        let bm = BroadcastManager::new();
        let (conn, mut rx) = make_connection("c1");
        bm.add(conn).await;

        let event = RpcEvent::new(
            "scan_result_broadcast",
            Some(serde_json::json!({"clientName": "agent-1", "flagged": true})),
        );
        bm.broadcast_all(&event).await;

        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "scan_result_broadcast");
        assert_eq!(parsed["data"]["clientName"], "agent-1");
        assert_eq!(parsed["data"]["flagged"], true);
    }

    #[tokio::test]
    async fn add_connection_overwrites_same_id() {
        let bm = BroadcastManager::new();
        let (c1, _rx1) = make_connection("same_id");
        let (c2, mut rx2) = make_connection("same_id");
        bm.add(c1).await;
        bm.add(c2).await;
        assert_eq!(bm.connection_count().await, 1);

        let _ = bm.send_to("same_id", &make_event("scan_file")).await;
        assert!(rx2.try_recv().is_ok());
    }
}
