//! Default value functions for configuration fields.
//!
//! Used by serde's `#[serde(default = ...)]` attributes throughout the
//! configuration system.

use super::logging::LogFormat;

// =============================================================================
// Listener
// =============================================================================

pub const fn default_port() -> u16 {
    8080
}

pub fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

// =============================================================================
// Relay Defaults
// =============================================================================

pub fn default_signal_path() -> String {
    "/signal".to_string()
}

/// 0 disables the connection cap.
pub const fn default_max_connections() -> usize {
    0
}

pub const fn default_outbound_queue_capacity() -> usize {
    256
}

pub const fn default_send_timeout_ms() -> u64 {
    5_000
}

pub const fn default_max_message_size() -> usize {
    65_536 // 64KB, generous for SDP blobs
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "relay.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub const fn default_require_metrics_auth() -> bool {
    false
}
