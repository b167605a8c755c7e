//! Relay endpoint configuration types.

use super::defaults::{
    default_max_connections, default_max_message_size, default_outbound_queue_capacity,
    default_send_timeout_ms, default_signal_path,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the signaling route and the per-connection fan-out machinery.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// HTTP path upgraded to the signaling WebSocket
    #[serde(default = "default_signal_path")]
    pub path: String,
    /// Maximum simultaneously registered connections (0 = unlimited)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Frames buffered per recipient before further broadcasts to it are dropped
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Upper bound for a single socket write to a recipient (milliseconds)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Maximum inbound WebSocket message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl RelayConfig {
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.path.starts_with('/') {
            anyhow::bail!("relay.path must start with '/' (configured: {:?})", self.path);
        }
        if self.outbound_queue_capacity == 0 {
            anyhow::bail!("relay.outbound_queue_capacity must be at least 1");
        }
        if self.send_timeout_ms == 0 {
            anyhow::bail!("relay.send_timeout_ms must be greater than zero");
        }
        if self.max_message_size == 0 {
            anyhow::bail!("relay.max_message_size must be greater than zero");
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            path: default_signal_path(),
            max_connections: default_max_connections(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
            max_message_size: default_max_message_size(),
        }
    }
}
