//! The Hub: accepts connections, binds them to sessions, and routes each
//! inbound frame to the other members of its session.

use std::sync::Arc;
use std::time::Duration;

use boothlink_common::{ConnectionId, HubMessage, RegisterRequest, SessionId};
use boothlink_config::{HubConfig, SessionPolicy};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{classify, Inbound};
use crate::registry::{Binding, ConnectionHandle, ConnectionRegistry, Delivery, Frame};

/// A newly accepted connection: its handle plus the queue its socket task
/// drains.
pub struct Accepted {
    pub handle: Arc<ConnectionHandle>,
    pub outbound: mpsc::Receiver<Frame>,
}

/// Why a frame was discarded. The sending connection stays open in every
/// case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    Unregistered,
    NoSession,
    UnknownConnection,
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Write this frame back to the sender only.
    Reply(Frame),
    Relayed(Delivery),
    Dropped(DropReason),
}

pub struct Hub {
    registry: ConnectionRegistry,
    config: HubConfig,
    policy: SessionPolicy,
}

impl Hub {
    pub fn new(config: HubConfig, policy: SessionPolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            config,
            policy,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Assign an identifier and an outbound queue to a new socket. Its
    /// cancel token is a child of `parent`, so server shutdown reaches it.
    pub async fn accept(&self, parent: &CancellationToken) -> Accepted {
        let (tx, outbound) = mpsc::channel(self.config.outbound_queue.max(1));
        let handle = Arc::new(ConnectionHandle::new(
            ConnectionId::new(),
            tx,
            parent.child_token(),
        ));
        self.registry.insert(handle.clone()).await;
        tracing::info!(conn = %handle.id, "Connection accepted");
        Accepted { handle, outbound }
    }

    /// Handle one text frame from `conn`.
    pub async fn handle_frame(&self, conn: &ConnectionId, text: Frame) -> Dispatch {
        match classify(text.as_str()) {
            Ok(Inbound::Register(request)) => self.register(conn, request).await,
            Ok(Inbound::Relay { kind, session }) => self.relay(conn, &kind, session, text).await,
            Err(e) => {
                tracing::debug!(conn = %conn, error = %e, "Dropping malformed frame");
                Dispatch::Dropped(DropReason::Malformed)
            }
        }
    }

    async fn register(&self, conn: &ConnectionId, request: RegisterRequest) -> Dispatch {
        let session_id = request.session_id.unwrap_or_else(SessionId::generate);
        let binding = Binding {
            role: request.role,
            session_id: session_id.clone(),
        };

        let previous = match self.registry.bind(conn, binding.clone()).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, "Registration for vanished connection");
                return Dispatch::Dropped(DropReason::UnknownConnection);
            }
        };

        tracing::info!(
            conn = %conn,
            session = %session_id,
            role = %request.role,
            "Connection registered"
        );

        // Re-registering into the same session is not a membership change.
        let left = previous
            .as_ref()
            .filter(|prev| prev.session_id != session_id);
        let joined = previous.is_none() || left.is_some();

        if let Some(prev) = left {
            if self.policy.notify_peer_left {
                self.announce_left(conn, prev).await;
            }
        }
        if joined && self.policy.notify_peer_joined {
            let notice = HubMessage::PeerJoined {
                connection_id: conn.to_string(),
                session_id: session_id.to_string(),
                role: binding.role,
            };
            self.announce(conn, &session_id, &notice).await;
        }

        let reply = HubMessage::Registered {
            connection_id: conn.to_string(),
            session_id: session_id.to_string(),
        };
        match reply.to_json() {
            Ok(json) => Dispatch::Reply(Frame::from(json)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode registration reply");
                Dispatch::Dropped(DropReason::Malformed)
            }
        }
    }

    async fn relay(
        &self,
        conn: &ConnectionId,
        kind: &str,
        session: Option<SessionId>,
        frame: Frame,
    ) -> Dispatch {
        let Some(session) = session else {
            tracing::debug!(conn = %conn, kind, "Dropping frame without sessionId");
            return Dispatch::Dropped(DropReason::NoSession);
        };
        if self.registry.binding(conn).await.is_none() {
            tracing::debug!(conn = %conn, kind, "Dropping frame from unregistered connection");
            return Dispatch::Dropped(DropReason::Unregistered);
        }

        let delivery = self.registry.fan_out(conn, &session, &frame).await;
        tracing::debug!(
            conn = %conn,
            session = %session,
            kind,
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Relayed frame"
        );
        Dispatch::Relayed(delivery)
    }

    /// Forget `conn`. Safe to call more than once.
    pub async fn close(&self, conn: &ConnectionId) {
        let Some((handle, binding)) = self.registry.remove(conn).await else {
            return;
        };
        tracing::info!(
            conn = %conn,
            session = binding.as_ref().map(|b| b.session_id.as_str()),
            dropped = handle.dropped_count(),
            connected_for = ?handle.connected_at.elapsed(),
            "Connection removed"
        );
        if let Some(binding) = binding {
            if self.policy.notify_peer_left {
                self.announce_left(conn, &binding).await;
            }
        }
    }

    /// Ask the socket task for `conn` to close. Returns false if unknown.
    pub async fn disconnect(&self, conn: &ConnectionId) -> bool {
        match self.registry.handle(conn).await {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Close every connection of every session idle for at least `ttl`.
    /// Returns the number of sessions affected.
    pub async fn reap_idle(&self, ttl: Duration) -> usize {
        let idle = self.registry.idle_sessions(ttl).await;
        for (session, handles) in &idle {
            tracing::info!(
                session = %session,
                members = handles.len(),
                "Reaping idle session"
            );
            for handle in handles {
                handle.close();
            }
        }
        idle.len()
    }

    async fn announce_left(&self, conn: &ConnectionId, binding: &Binding) {
        let notice = HubMessage::PeerLeft {
            connection_id: conn.to_string(),
            session_id: binding.session_id.to_string(),
            role: binding.role,
        };
        self.announce(conn, &binding.session_id, &notice).await;
    }

    async fn announce(&self, about: &ConnectionId, session: &SessionId, notice: &HubMessage) {
        match notice.to_json() {
            Ok(json) => {
                let _ = self
                    .registry
                    .fan_out(about, session, &Frame::from(json))
                    .await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode peer notice"),
        }
    }
}
