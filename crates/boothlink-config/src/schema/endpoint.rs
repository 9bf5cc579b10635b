use serde::{Deserialize, Serialize};

/// Settings for an endpoint session client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// WebSocket URL of the relay Hub.
    pub url: String,
    /// `control` or `hub` (`pc` is accepted as `hub`).
    pub role: String,
    /// Session to join; empty asks the Hub for a new one.
    pub session_id: String,
    pub reconnect_initial_secs: u64,
    pub reconnect_max_secs: u64,
    pub connect_timeout_secs: u64,
    pub register_timeout_secs: u64,
    /// Envelopes buffered between the application and the socket.
    pub outbound_queue: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000".into(),
            role: "control".into(),
            session_id: String::new(),
            reconnect_initial_secs: 2,
            reconnect_max_secs: 30,
            connect_timeout_secs: 15,
            register_timeout_secs: 10,
            outbound_queue: 64,
        }
    }
}
