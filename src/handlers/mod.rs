//! Request handlers for the hub's server endpoints

pub mod websocket;

// Re-export the websocket entry points
pub use websocket::{handle_ws_client, ws_route};
