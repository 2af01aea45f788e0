// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";

// Framing defaults
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 10_000;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

// Buffer pool configuration
pub const DEFAULT_BUFFER_POOL_CAPACITY: usize = 64;
