//! # scanhub-rpc
//!
//! Wire-format types for the scanhub WebSocket channel.
//!
//! - Request/response envelopes (`RpcRequest`, `RpcResponse`)
//! - Server-pushed events (`RpcEvent`)
//! - Error codes and the handler-level `RpcError` type

#![deny(unsafe_code)]

pub mod errors;
pub mod types;
