//! Shared defaults used across memtable crates.

/// Default API port.
pub const DEFAULT_PORT: u16 = 38511;

/// Default cap on the edit text accepted by the API layer.
pub const DEFAULT_MAX_EDIT_TEXT_SIZE: usize = 1024 * 1024;

/// Default tracing filter for the binary.
pub const DEFAULT_LOG_FILTER: &str = "memtable=info,tower_http=warn";
