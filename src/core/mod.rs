//! Core functionality of the message distribution hub

pub mod buffer;
pub mod connection;
pub mod group;
pub mod hub;
pub mod lifecycle;
pub mod registry;
pub mod transport;

// Re-export main components for convenience
pub use buffer::{BufferPool, PooledBuffer};
pub use connection::{Connection, ConnectionStats, MessageKind};
pub use group::{Group, GroupRegistry};
pub use hub::Hub;
pub use lifecycle::{run_session, EventHandler, SessionContext};
pub use registry::ConnectionList;
pub use transport::{Frame, TransportSink, TransportStream};
