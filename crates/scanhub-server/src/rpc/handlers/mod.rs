//! RPC method handlers and registration.

use scanhub_rpc::errors::RpcError;
use serde_json::Value;

use crate::rpc::registry::MethodRegistry;

pub mod relay;

/// Register every scanhub method on the given registry.
pub fn register_all(registry: &mut MethodRegistry) {
    registry.register("client_connect", relay::ClientConnectHandler);
    registry.register("request_clients", relay::RequestClientsHandler);
    registry.register("scan_file", relay::ScanFileHandler);
    registry.register("scan_result", relay::ScanResultHandler);
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(params: Option<&Value>, name: &str) -> Result<String, RpcError> {
    params
        .and_then(|p| p.get(name))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Missing required parameter '{name}'"),
        })
}

/// Extract an optional string parameter.
pub(crate) fn optional_string_param(params: Option<&Value>, name: &str) -> Option<String> {
    params
        .and_then(|p| p.get(name))
        .and_then(Value::as_str)
        .map(str::to_owned)
}
