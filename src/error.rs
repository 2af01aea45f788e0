use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum HubError {
    // Connection errors
    /// Operation attempted on a connection already marked unusable
    Aborted,
    ConnectionClosed,
    /// Identity change attempted after the connection was finalized
    ConnectionFinalized,

    // Framing errors
    MessageTooLarge(usize),
    Timeout,

    // Transport errors
    TransportError(String),
    SendFailed(String),

    // Message errors
    MessageParseError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => write!(f, "Connection aborted"),
            Self::ConnectionClosed => write!(f, "Connection closed by peer"),
            Self::ConnectionFinalized => write!(f, "Connection identity is finalized"),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::Timeout => write!(f, "Read timed out before a complete message arrived"),
            Self::TransportError(msg) => write!(f, "Transport error: {}", msg),
            Self::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for HubError {}

// Generic result type for the hub
pub type Result<T> = std::result::Result<T, HubError>;
