use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Relay Hub listener and per-connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind (0 picks a free port).
    pub port: u16,
    /// Frames buffered per connection before deliveries to it are dropped.
    pub outbound_queue: usize,
    /// Largest accepted WebSocket message. Photos travel as data URLs.
    pub max_message_bytes: usize,
    /// Upper bound on a single socket write.
    pub write_timeout_secs: u64,
    /// Ping period (0 disables heartbeat).
    pub heartbeat_interval_secs: u64,
    /// Close a socket silent for this long.
    pub heartbeat_timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            outbound_queue: 256,
            max_message_bytes: 16 * 1024 * 1024,
            write_timeout_secs: 10,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

impl HubConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// `None` when heartbeat is disabled.
    pub fn heartbeat(&self) -> Option<(Duration, Duration)> {
        (self.heartbeat_interval_secs > 0).then(|| {
            (
                Duration::from_secs(self.heartbeat_interval_secs),
                Duration::from_secs(self.heartbeat_timeout_secs),
            )
        })
    }
}
