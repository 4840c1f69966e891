//! WebSocket connection management, message dispatch, and broadcasting.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod session;
