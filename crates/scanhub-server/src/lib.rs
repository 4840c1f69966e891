//! # scanhub-server
//!
//! Axum HTTP + `WebSocket` server for the scanhub demo dashboard.
//!
//! - In-memory client registry, mutated on connect/announce/disconnect
//! - Scan relay: directed `scan_file` delivery, `scan_result_broadcast` fan-out
//! - Demo-directory file store with upload/list/download HTTP endpoints
//! - Event fan-out to all connected clients via per-connection send channels
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod files;
pub mod health;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;
