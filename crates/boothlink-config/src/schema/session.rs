use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session lifecycle policy. Everything is off by default: the Hub neither
/// announces peers nor expires sessions unless asked to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Send `peer-joined` to the other members when a connection registers.
    pub notify_peer_joined: bool,
    /// Send `peer-left` to the remaining members when a registered
    /// connection closes.
    pub notify_peer_left: bool,
    /// Expire sessions idle for this long (0 = never).
    pub idle_session_ttl_secs: u64,
    /// How often the reaper looks for idle sessions.
    pub reap_interval_secs: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            notify_peer_joined: false,
            notify_peer_left: false,
            idle_session_ttl_secs: 0,
            reap_interval_secs: 60,
        }
    }
}

impl SessionPolicy {
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_session_ttl_secs > 0).then(|| Duration::from_secs(self.idle_session_ttl_secs))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}
