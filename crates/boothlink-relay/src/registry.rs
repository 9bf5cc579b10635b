//! Connection registry: every accepted socket, its session binding, and
//! the per-session membership index used for fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use boothlink_common::{ConnectionId, Role, SessionId};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// A text frame queued for one socket. Cloning is a refcount bump, so a
/// single photo payload is shared by every recipient.
pub type Frame = Utf8Bytes;

/// Sending half of one accepted socket.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub connected_at: Instant,
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>, cancel: CancellationToken) -> Self {
        Self {
            id,
            connected_at: Instant::now(),
            tx,
            cancel,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a frame without waiting. Returns false when the queue is full
    /// or the socket task has already gone away.
    pub fn deliver(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(_) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask the socket task to close.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// The session a connection registered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub role: Role,
    pub session_id: SessionId,
}

#[derive(Debug, thiserror::Error)]
#[error("connection {0} is not known to the registry")]
pub struct UnknownConnection(pub ConnectionId);

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

struct Slot {
    handle: Arc<ConnectionHandle>,
    binding: Option<Binding>,
}

struct SessionEntry {
    members: HashSet<ConnectionId>,
    /// Milliseconds since the registry epoch.
    last_activity: AtomicU64,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Slot>,
    sessions: HashMap<SessionId, SessionEntry>,
}

/// Thread-safe registry. Relays take the read lock; only accept,
/// registration and close take the write lock.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
    epoch: Instant,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Track a freshly accepted, not yet registered connection.
    pub async fn insert(&self, handle: Arc<ConnectionHandle>) {
        let mut inner = self.inner.write().await;
        let _ = inner.connections.insert(
            handle.id.clone(),
            Slot {
                handle,
                binding: None,
            },
        );
    }

    /// Bind a connection to a session, replacing any earlier binding.
    /// Returns the binding that was replaced.
    pub async fn bind(
        &self,
        id: &ConnectionId,
        binding: Binding,
    ) -> Result<Option<Binding>, UnknownConnection> {
        let now = self.now_ms();
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let slot = inner
            .connections
            .get_mut(id)
            .ok_or_else(|| UnknownConnection(id.clone()))?;
        let previous = slot.binding.replace(binding.clone());

        if let Some(prev) = &previous {
            leave_session(&mut inner.sessions, &prev.session_id, id);
        }

        let entry = inner
            .sessions
            .entry(binding.session_id)
            .or_insert_with(|| SessionEntry {
                members: HashSet::new(),
                last_activity: AtomicU64::new(now),
            });
        let _ = entry.members.insert(id.clone());
        entry.last_activity.store(now, Ordering::Relaxed);

        Ok(previous)
    }

    pub async fn binding(&self, id: &ConnectionId) -> Option<Binding> {
        let inner = self.inner.read().await;
        inner.connections.get(id)?.binding.clone()
    }

    pub async fn handle(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let inner = self.inner.read().await;
        inner.connections.get(id).map(|slot| slot.handle.clone())
    }

    /// Queue `frame` on every member of `session` except `sender`.
    ///
    /// Never waits on a recipient: a full or closed queue counts as a drop
    /// and the remaining members are still served.
    pub async fn fan_out(
        &self,
        sender: &ConnectionId,
        session: &SessionId,
        frame: &Frame,
    ) -> Delivery {
        let inner = self.inner.read().await;
        let mut delivery = Delivery::default();

        let Some(entry) = inner.sessions.get(session) else {
            return delivery;
        };
        entry.last_activity.store(self.now_ms(), Ordering::Relaxed);

        for member in entry.members.iter().filter(|m| *m != sender) {
            let Some(slot) = inner.connections.get(member) else {
                continue;
            };
            if slot.handle.deliver(frame.clone()) {
                delivery.delivered += 1;
            } else {
                delivery.dropped += 1;
                tracing::warn!(
                    conn = %member,
                    session = %session,
                    "Recipient queue full or closed, frame dropped"
                );
            }
        }

        delivery
    }

    /// Forget a connection. Returns its handle and binding if it was known.
    pub async fn remove(
        &self,
        id: &ConnectionId,
    ) -> Option<(Arc<ConnectionHandle>, Option<Binding>)> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let slot = inner.connections.remove(id)?;
        if let Some(binding) = &slot.binding {
            leave_session(&mut inner.sessions, &binding.session_id, id);
        }
        Some((slot.handle, slot.binding))
    }

    pub async fn session_members(&self, session: &SessionId) -> Vec<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session)
            .map(|entry| entry.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sessions with no relayed traffic or registration for longer than
    /// `ttl`, together with their member handles.
    pub async fn idle_sessions(
        &self,
        ttl: Duration,
    ) -> Vec<(SessionId, Vec<Arc<ConnectionHandle>>)> {
        let now = self.now_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let inner = self.inner.read().await;

        inner
            .sessions
            .iter()
            .filter(|(_, entry)| {
                now.saturating_sub(entry.last_activity.load(Ordering::Relaxed)) >= ttl_ms
            })
            .map(|(sid, entry)| {
                let handles = entry
                    .members
                    .iter()
                    .filter_map(|m| inner.connections.get(m).map(|s| s.handle.clone()))
                    .collect();
                (sid.clone(), handles)
            })
            .collect()
    }

    /// Cancel every tracked connection.
    pub async fn close_all(&self) -> usize {
        let inner = self.inner.read().await;
        for slot in inner.connections.values() {
            slot.handle.close();
        }
        inner.connections.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn leave_session(
    sessions: &mut HashMap<SessionId, SessionEntry>,
    session: &SessionId,
    id: &ConnectionId,
) {
    if let Some(entry) = sessions.get_mut(session) {
        let _ = entry.members.remove(id);
        if entry.members.is_empty() {
            let _ = sessions.remove(session);
        }
    }
}
