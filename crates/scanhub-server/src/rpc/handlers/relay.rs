//! Relay handlers: announce, registry snapshot, scan routing, result fan-out.

use async_trait::async_trait;
use metrics::counter;
use scanhub_rpc::errors::{self, RpcError};
use scanhub_rpc::types::RpcEvent;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::registry::{ClientInfo, UNNAMED_CLIENT};
use crate::rpc::context::RelayContext;
use crate::rpc::handlers::{optional_string_param, require_string_param};
use crate::rpc::registry::MethodHandler;

/// Scan result reported by an agent, relayed verbatim apart from enrichment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Connection id of the reporting agent.
    pub client_id: String,
    /// Name of the scanned file.
    pub filename: String,
    /// Hex digest computed by the agent.
    pub sha256: String,
    /// Whether the agent flagged the file.
    pub flagged: bool,
    /// Reason the file was flagged, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Agent-side scan timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Build the `clients_update` event carrying the full registry snapshot.
pub fn clients_update_event(clients: Vec<ClientInfo>) -> RpcEvent {
    RpcEvent::new("clients_update", Some(json!({ "clients": clients })))
}

/// `client_connect` — a client announces itself.
///
/// The entry is keyed by the transport connection id regardless of any
/// client-supplied id, so an announce can only rename the announcing
/// connection, never create a second entry.
pub struct ClientConnectHandler;

#[async_trait]
impl MethodHandler for ClientConnectHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RelayContext) -> Result<Value, RpcError> {
        let name = optional_string_param(params.as_ref(), "clientName")
            .unwrap_or_else(|| UNNAMED_CLIENT.to_owned());

        ctx.registry
            .upsert(ClientInfo::new(
                &ctx.connection_id,
                &name,
                ctx.remote_addr.clone(),
            ))
            .await;
        debug!(conn_id = %ctx.connection_id, name, "client announced");

        let snapshot = ctx.registry.snapshot().await;
        ctx.broadcast.broadcast_all(&clients_update_event(snapshot)).await;

        Ok(json!({ "clientId": ctx.connection_id, "clientName": name }))
    }
}

/// `request_clients` — reply with the current registry snapshot.
pub struct RequestClientsHandler;

#[async_trait]
impl MethodHandler for RequestClientsHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RelayContext) -> Result<Value, RpcError> {
        let clients = ctx.registry.snapshot().await;
        Ok(json!({ "clients": clients }))
    }
}

/// `scan_file` — forward a scan request to one named client.
///
/// An unconnected target is an error reply, not a silent drop, so the
/// requesting dashboard always learns whether the request was routed.
pub struct ScanFileHandler;

#[async_trait]
impl MethodHandler for ScanFileHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RelayContext) -> Result<Value, RpcError> {
        let target = require_string_param(params.as_ref(), "clientId")?;
        let filename = require_string_param(params.as_ref(), "filename")?;

        let event = RpcEvent::new("scan_file", Some(json!({ "filename": filename })));
        if !ctx.broadcast.send_to(&target, &event).await {
            return Err(RpcError::NotFound {
                code: errors::TARGET_NOT_CONNECTED.into(),
                message: format!("Client '{target}' is not connected"),
            });
        }

        counter!("scan_requests_total").increment(1);
        debug!(target = %target, filename, "scan request routed");
        Ok(json!({ "delivered": true, "clientId": target }))
    }
}

/// `scan_result` — enrich a reported result with the sender's display name
/// and broadcast it to every connection.
pub struct ScanResultHandler;

#[async_trait]
impl MethodHandler for ScanResultHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RelayContext) -> Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::InvalidParams {
            message: "Missing scan result payload".into(),
        })?;
        let result: ScanResult =
            serde_json::from_value(params).map_err(|e| RpcError::InvalidParams {
                message: format!("Invalid scan result: {e}"),
            })?;

        let client_name = ctx.registry.lookup_name(&result.client_id).await;
        let mut data = serde_json::to_value(&result).map_err(|e| RpcError::Internal {
            message: format!("Failed to serialize scan result: {e}"),
        })?;
        data["clientName"] = json!(client_name);

        counter!("scan_results_total", "flagged" => result.flagged.to_string()).increment(1);
        debug!(
            client_id = %result.client_id,
            filename = %result.filename,
            flagged = result.flagged,
            "scan result broadcast"
        );
        ctx.broadcast
            .broadcast_all(&RpcEvent::new("scan_result_broadcast", Some(data)))
            .await;

        Ok(json!({ "broadcast": true }))
    }
}
