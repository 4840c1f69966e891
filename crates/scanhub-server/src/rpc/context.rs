//! Per-connection context passed to every RPC handler.

use std::sync::Arc;

use crate::registry::ClientRegistry;
use crate::websocket::broadcast::BroadcastManager;

/// Shared state plus the identity of the connection a request arrived on.
#[derive(Clone)]
pub struct RelayContext {
    /// Connection id of the requesting client.
    pub connection_id: String,
    /// Best-effort peer address of the requesting client.
    pub remote_addr: Option<String>,
    /// Registry of connected clients.
    pub registry: Arc<ClientRegistry>,
    /// Live connection send handles.
    pub broadcast: Arc<BroadcastManager>,
}

impl RelayContext {
    /// Build a context for one connection.
    pub fn new(
        connection_id: impl Into<String>,
        remote_addr: Option<String>,
        registry: Arc<ClientRegistry>,
        broadcast: Arc<BroadcastManager>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            remote_addr,
            registry,
            broadcast,
        }
    }
}
