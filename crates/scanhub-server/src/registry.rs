//! In-memory registry of connected clients.
//!
//! Entries are keyed by the transport connection id. An announce replaces the
//! whole entry for its connection; a client-supplied id never becomes a key,
//! so one physical connection maps to exactly one entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Display name used when a client never supplied one.
pub const UNNAMED_CLIENT: &str = "Unnamed Client";

/// Display name used when enriching a result for an unknown sender.
pub const UNKNOWN_CLIENT: &str = "Unknown";

/// Metadata for one connected agent or dashboard.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Transport connection id; primary key of the registry.
    pub client_id: String,
    /// Human-readable label supplied by the client.
    pub client_name: String,
    /// Best-effort peer address, informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    /// RFC 3339 timestamp of the last connect or announce. Advisory only.
    pub last_seen: String,
}

impl ClientInfo {
    /// Build an entry stamped with the current time.
    pub fn new(client_id: impl Into<String>, client_name: impl Into<String>, remote_addr: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: client_name.into(),
            remote_addr,
            last_seen: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Registry of currently connected clients.
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ClientInfo>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or fully replace the entry for `info.client_id`.
    pub async fn upsert(&self, info: ClientInfo) {
        let mut clients = self.clients.write().await;
        let _ = clients.insert(info.client_id.clone(), info);
    }

    /// Delete the entry if present. No-op otherwise.
    pub async fn remove(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        let _ = clients.remove(client_id);
    }

    /// All current entries, order-irrelevant, reflecting state at call time.
    pub async fn snapshot(&self) -> Vec<ClientInfo> {
        self.clients.read().await.values().cloned().collect()
    }

    /// Display name for a client, or [`UNKNOWN_CLIENT`] if absent.
    pub async fn lookup_name(&self, client_id: &str) -> String {
        self.clients
            .read()
            .await
            .get(client_id)
            .map_or_else(|| UNKNOWN_CLIENT.to_owned(), |c| c.client_name.clone())
    }

    /// Number of registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
