//! wshub - A real-time message distribution hub for WebSocket connections
//!
//! Tracks every active connection, organizes connections into named groups,
//! and lets a handler broadcast to one connection, a set of connections, or
//! an entire group over long-lived duplex sockets.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;
