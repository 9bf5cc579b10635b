//! Public handle for the background relay connection.

use serde_json::{Map, Value};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use boothlink_common::{Envelope, SessionId};

use crate::connection::{connection_loop, LoopContext};
use crate::error::ClientError;
use crate::types::{ClientCommand, ClientEvent, ConnectionState, SessionClientConfig};

/// Handle for one logical relay connection.
///
/// Sending never waits on the network: envelopes are queued for the
/// background task. Dropping the handle stops the task and any pending
/// reconnect.
pub struct SessionClient {
    command_tx: mpsc::Sender<ClientCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    session_rx: watch::Receiver<Option<SessionId>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionClient {
    /// Start the background connection on the current Tokio runtime.
    /// Returns `(client, event_receiver)`.
    pub fn connect(config: SessionClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_queue.max(1));
        let (command_tx, command_rx) = mpsc::channel(config.outbound_queue.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (session_tx, session_rx) = watch::channel(config.session_id.clone());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(connection_loop(LoopContext {
            config,
            state_tx,
            session_tx,
            event_tx,
            command_rx,
            cancel: cancel.clone(),
        }));

        let client = Self {
            command_tx,
            state_rx,
            session_rx,
            cancel,
            task: Some(task),
        };
        (client, event_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// The binary status the application shows: true only while Active.
    pub fn is_registered(&self) -> bool {
        self.state().is_registered()
    }

    /// Effective session id: the configured one until the Hub confirms,
    /// then whatever the Hub confirmed.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_rx.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until the client is Active and return its session id.
    pub async fn wait_until_registered(&self) -> Result<SessionId, ClientError> {
        let mut state = self.state_rx.clone();
        let _ = state
            .wait_for(|s| s.is_registered())
            .await
            .map_err(|_| ClientError::Closed)?;
        self.session_id().ok_or(ClientError::NotConnected)
    }

    /// Queue an envelope of type `kind` with `body`, stamped with the
    /// current session id.
    pub fn send(&self, kind: impl Into<String>, body: Map<String, Value>) -> Result<(), ClientError> {
        let mut envelope = Envelope::new(kind);
        envelope.body = body;
        self.send_envelope(envelope)
    }

    /// Queue a prebuilt envelope. A missing `sessionId` is filled in.
    pub fn send_envelope(&self, envelope: Envelope) -> Result<(), ClientError> {
        if !self.is_registered() {
            return Err(ClientError::NotConnected);
        }
        self.command_tx
            .try_send(ClientCommand::Send(envelope))
            .map_err(|e| match e {
                TrySendError::Full(_) => ClientError::QueueFull,
                TrySendError::Closed(_) => ClientError::Closed,
            })
    }

    /// Stop reconnecting, close the socket, and wait for the task to end.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
