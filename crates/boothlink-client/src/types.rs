//! Configuration, state, and event/command enums for the session client.

use std::time::Duration;

use boothlink_common::{Envelope, ProtocolError, Role, SessionId};
use boothlink_config::EndpointConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Smallest reconnect delay accepted from a config file.
pub const MIN_CONFIGURED_DELAY: Duration = Duration::from_secs(2);

/// How a [`SessionClient`](crate::SessionClient) reaches and joins the Hub.
#[derive(Debug, Clone)]
pub struct SessionClientConfig {
    /// WebSocket URL of the Hub, e.g. `ws://127.0.0.1:3000`.
    pub url: String,
    pub role: Role,
    /// Session to join. `None` lets the Hub assign one, which the client
    /// then keeps for every later reconnect.
    pub session_id: Option<SessionId>,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub connect_timeout: Duration,
    pub register_timeout: Duration,
    /// Capacity of the outbound command queue.
    pub outbound_queue: usize,
    /// Capacity of the event channel returned by `connect`.
    pub event_queue: usize,
}

impl SessionClientConfig {
    pub fn new(url: impl Into<String>, role: Role) -> Self {
        Self {
            url: url.into(),
            role,
            session_id: None,
            reconnect_initial: Duration::from_secs(2),
            reconnect_max: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            register_timeout: Duration::from_secs(10),
            outbound_queue: 64,
            event_queue: 256,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Build from the `[endpoint]` config section. Reconnect delays below
    /// [`MIN_CONFIGURED_DELAY`] are raised to it.
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Result<Self, ProtocolError> {
        let role = endpoint.role.parse()?;
        let mut config = Self::new(endpoint.url.clone(), role);
        config.session_id = SessionId::from_client(Some(&endpoint.session_id));
        config.reconnect_initial =
            Duration::from_secs(endpoint.reconnect_initial_secs).max(MIN_CONFIGURED_DELAY);
        config.reconnect_max =
            Duration::from_secs(endpoint.reconnect_max_secs).max(config.reconnect_initial);
        config.connect_timeout = Duration::from_secs(endpoint.connect_timeout_secs);
        config.register_timeout = Duration::from_secs(endpoint.register_timeout_secs);
        config.outbound_queue = endpoint.outbound_queue;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket open, `register` sent, confirmation not yet received.
    RegisteredPending,
    Active,
}

impl ConnectionState {
    pub fn is_registered(self) -> bool {
        self == ConnectionState::Active
    }
}

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// Events delivered to the application from the background connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Socket opened; registration is in flight.
    Connected,
    /// The Hub confirmed registration.
    Registered {
        connection_id: String,
        session_id: SessionId,
    },
    /// An application envelope relayed from a peer.
    Message(Envelope),
    PeerJoined {
        connection_id: String,
        role: Role,
    },
    PeerLeft {
        connection_id: String,
        role: Role,
    },
    /// An established connection was lost; a reconnect is scheduled.
    Disconnected,
    /// A connect or registration attempt failed.
    Error(String),
}

/// Commands sent from the handle to the connection loop.
#[derive(Debug)]
pub(crate) enum ClientCommand {
    Send(Envelope),
}
