//! Hub configuration module
//! Handles dynamic configuration parameters for the message distribution hub

use crate::constants::{
    DEFAULT_BUFFER_POOL_CAPACITY, DEFAULT_HOST, DEFAULT_KEEP_ALIVE_MS, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS,
};
use crate::error::{HubError, Result};
use std::env;
use std::time::Duration;

/// Options for the structured-message convenience layer
#[derive(Debug, Clone, Default)]
pub struct SerializerOptions {
    /// Emit pretty-printed JSON instead of compact JSON
    pub pretty: bool,
}

/// Hub configuration parameters
#[derive(Debug, Clone)]
pub struct HubOptions {
    pub host: String,
    pub port: u16,
    /// A read fails with `Timeout` if a logical message does not complete within this window
    pub read_message_timeout: Duration,
    /// Delay between successive receive attempts in the session loop (zero disables the delay)
    pub keep_alive_interval: Duration,
    /// Hard ceiling on the byte size of one logical message
    pub max_message_size: usize,
    /// Toggle per-connection byte counters
    pub enable_statistics: bool,
    /// Maximum number of read buffers retained by the pool
    pub buffer_pool_capacity: usize,
    pub serializer: SerializerOptions,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_message_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            keep_alive_interval: Duration::from_millis(DEFAULT_KEEP_ALIVE_MS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            enable_statistics: false,
            buffer_pool_capacity: DEFAULT_BUFFER_POOL_CAPACITY,
            serializer: SerializerOptions::default(),
        }
    }
}

impl HubOptions {
    /// Create a configuration suited to the test suite: small messages,
    /// generous read timeout, no keep-alive delay between receives.
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            read_message_timeout: Duration::from_secs(5),
            keep_alive_interval: Duration::ZERO,
            max_message_size: 1024,
            enable_statistics: true,
            buffer_pool_capacity: 8,
            serializer: SerializerOptions::default(),
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let options = Self {
            host: env::var("WSHUB_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: parse_env("WSHUB_PORT", DEFAULT_PORT)?,
            read_message_timeout: Duration::from_millis(parse_env(
                "WSHUB_READ_TIMEOUT_MS",
                DEFAULT_READ_TIMEOUT_MS,
            )?),
            keep_alive_interval: Duration::from_millis(parse_env(
                "WSHUB_KEEP_ALIVE_MS",
                DEFAULT_KEEP_ALIVE_MS,
            )?),
            max_message_size: parse_env("WSHUB_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE)?,
            enable_statistics: parse_env("WSHUB_ENABLE_STATISTICS", false)?,
            buffer_pool_capacity: parse_env(
                "WSHUB_BUFFER_POOL_CAPACITY",
                DEFAULT_BUFFER_POOL_CAPACITY,
            )?,
            serializer: SerializerOptions {
                pretty: parse_env("WSHUB_JSON_PRETTY", false)?,
            },
        };
        options.validate()?;
        Ok(options)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(HubError::ConfigError(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.read_message_timeout.is_zero() {
            return Err(HubError::ConfigError(
                "read_message_timeout must be greater than zero".to_string(),
            ));
        }
        if self.buffer_pool_capacity == 0 {
            return Err(HubError::ConfigError(
                "buffer_pool_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// Parse an environment variable, falling back to a default when unset
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| {
            HubError::ConfigError(format!("Invalid value for {}: '{}'", name, value))
        }),
        Err(_) => Ok(default),
    }
}
