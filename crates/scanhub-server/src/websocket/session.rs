//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use scanhub_rpc::types::RpcEvent;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::registry::{ClientInfo, ClientRegistry, UNNAMED_CLIENT};
use crate::rpc::context::RelayContext;
use crate::rpc::handlers::relay::clients_update_event;
use crate::rpc::registry::MethodRegistry;

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::handle_message;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the broadcast manager and the registry
///    (name from the handshake query or the placeholder)
/// 2. Sends a `connection.established` event with the connection id
/// 3. Dispatches incoming text frames as RPC requests
/// 4. Forwards outbound events/responses via the send channel
/// 5. On disconnect, removes the registry entry and broadcasts the snapshot
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: String,
    remote_addr: Option<String>,
    handshake_name: Option<String>,
    methods: Arc<MethodRegistry>,
    registry: Arc<ClientRegistry>,
    broadcast: Arc<BroadcastManager>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Create the client connection and send channel
    let (send_tx, mut send_rx) = mpsc::channel::<String>(1024);
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    info!(client_id, "client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    broadcast.add(connection.clone()).await;

    // Register under the connection id with the handshake name. Membership is
    // broadcast on announce and disconnect, not on plain open.
    let name = handshake_name.unwrap_or_else(|| UNNAMED_CLIENT.to_owned());
    registry
        .upsert(ClientInfo::new(&client_id, &name, remote_addr.clone()))
        .await;

    // Tell the client its connection id so it can be targeted by scans
    let greeting = RpcEvent::new(
        "connection.established",
        Some(serde_json::json!({ "clientId": client_id })),
    );
    if let Ok(json) = serde_json::to_string(&greeting) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    // Spawn outbound forwarder
    let outbound = tokio::spawn(async move {
        while let Some(text) = send_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let ctx = RelayContext::new(
        client_id.clone(),
        remote_addr,
        registry.clone(),
        broadcast.clone(),
    );

    // Process incoming messages
    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    Some(s.to_string())
                } else {
                    info!(client_id, len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!(client_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => None,
        };

        let Some(text) = text else { continue };

        let result = handle_message(&text, &methods, &ctx).await;
        if !connection.send(result.response_json) {
            info!(client_id, "failed to enqueue response (channel full or closed)");
        }
    }

    // Clean up: drop the entry and tell everyone who is left
    info!(client_id, "client disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    outbound.abort();
    registry.remove(&client_id).await;
    broadcast.remove(&client_id).await;

    let snapshot = registry.snapshot().await;
    broadcast.broadcast_all(&clients_update_event(snapshot)).await;
}

#[cfg(test)]
mod tests {
    // Full session behavior needs real WebSocket connections and is covered
    // by tests/integration.rs. These validate the greeting shape.

    use scanhub_rpc::types::RpcEvent;

    #[test]
    fn greeting_has_required_fields() {
        let greeting = RpcEvent::new(
            "connection.established",
            Some(serde_json::json!({ "clientId": "conn_123" })),
        );
        let v = serde_json::to_value(&greeting).unwrap();
        assert_eq!(v["type"], "connection.established");
        assert_eq!(v["data"]["clientId"], "conn_123");
        assert!(v["timestamp"].is_string());
    }
}
