//! Background connection loop: connect, register, relay, reconnect.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use boothlink_common::{HubMessage, Incoming, RegisterRequest, SessionId};

use crate::backoff::Backoff;
use crate::types::{ClientCommand, ClientEvent, ConnectionState, SessionClientConfig};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// How one connection attempt ended.
enum AttemptEnd {
    /// Shut down on request; do not reconnect.
    Shutdown,
    /// Never reached Active.
    Failed(String),
    /// Was Active, then lost the link.
    Lost(String),
}

/// Everything the loop shares with the [`SessionClient`](crate::SessionClient) handle.
pub(crate) struct LoopContext {
    pub(crate) config: SessionClientConfig,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
    pub(crate) session_tx: watch::Sender<Option<SessionId>>,
    pub(crate) event_tx: mpsc::Sender<ClientEvent>,
    pub(crate) command_rx: mpsc::Receiver<ClientCommand>,
    pub(crate) cancel: CancellationToken,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task keeping one logical relay connection alive until
/// cancelled. Retries without limit.
pub(crate) async fn connection_loop(mut ctx: LoopContext) {
    let mut backoff = Backoff::new(ctx.config.reconnect_initial, ctx.config.reconnect_max);
    // Last session used; adopted from the Hub after the first registration.
    let mut session = ctx.config.session_id.clone();

    loop {
        ctx.state_tx.send_replace(ConnectionState::Connecting);

        match attempt(&mut ctx, &mut session, &mut backoff).await {
            AttemptEnd::Shutdown => break,
            AttemptEnd::Failed(reason) => {
                warn!(reason = %reason, "Relay connection attempt failed");
                emit(&ctx.event_tx, ClientEvent::Error(reason));
            }
            AttemptEnd::Lost(reason) => {
                warn!(reason = %reason, "Relay connection lost");
                emit(&ctx.event_tx, ClientEvent::Disconnected);
            }
        }
        ctx.state_tx.send_replace(ConnectionState::Disconnected);

        let delay = backoff.next_delay();
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting");
        tokio::select! {
            () = ctx.cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    ctx.state_tx.send_replace(ConnectionState::Disconnected);
    info!("Session client stopped");
}

async fn attempt(
    ctx: &mut LoopContext,
    session: &mut Option<SessionId>,
    backoff: &mut Backoff,
) -> AttemptEnd {
    let config = &ctx.config;

    // 1. Open the socket.
    info!(url = %config.url, role = %config.role, "Connecting to relay");
    let connect = tokio::time::timeout(
        config.connect_timeout,
        tokio_tungstenite::connect_async(config.url.as_str()),
    );
    let ws = tokio::select! {
        () = ctx.cancel.cancelled() => return AttemptEnd::Shutdown,
        result = connect => match result {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => return AttemptEnd::Failed(format!("connection failed: {e}")),
            Err(_) => {
                return AttemptEnd::Failed(format!(
                    "connection timed out after {}s",
                    config.connect_timeout.as_secs()
                ))
            }
        },
    };
    emit(&ctx.event_tx, ClientEvent::Connected);
    let (mut sink, mut source) = ws.split();

    // 2. Register with the last session we used.
    let request = RegisterRequest::new(config.role, session.clone());
    let frame = match request.to_envelope().to_json() {
        Ok(json) => json,
        Err(e) => return AttemptEnd::Failed(e.to_string()),
    };
    if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
        return AttemptEnd::Failed(format!("register send failed: {e}"));
    }
    ctx.state_tx.send_replace(ConnectionState::RegisteredPending);

    // 3. Await the confirmation.
    let confirmation = tokio::time::timeout(
        config.register_timeout,
        read_confirmation(&mut source, &ctx.event_tx),
    );
    let (connection_id, confirmed) = tokio::select! {
        () = ctx.cancel.cancelled() => {
            let _ = sink.send(WsMessage::Close(None)).await;
            return AttemptEnd::Shutdown;
        }
        result = confirmation => match result {
            Ok(Ok(registered)) => registered,
            Ok(Err(reason)) => return AttemptEnd::Failed(reason),
            Err(_) => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return AttemptEnd::Failed(format!(
                    "no registration confirmation within {}s",
                    config.register_timeout.as_secs()
                ));
            }
        },
    };

    // 4. Adopt the Hub's session and go Active.
    *session = Some(confirmed.clone());
    ctx.session_tx.send_replace(Some(confirmed.clone()));
    ctx.state_tx.send_replace(ConnectionState::Active);
    backoff.reset();
    info!(conn = %connection_id, session = %confirmed, "Registered with relay");
    emit(
        &ctx.event_tx,
        ClientEvent::Registered {
            connection_id,
            session_id: confirmed,
        },
    );

    // 5. Relay until the link drops or we are told to stop.
    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return AttemptEnd::Shutdown;
            }

            command = ctx.command_rx.recv() => match command {
                Some(ClientCommand::Send(mut envelope)) => {
                    if envelope.session().is_none() {
                        envelope.session_id = session.as_ref().map(|s| s.to_string());
                    }
                    match envelope.to_json() {
                        Ok(json) => {
                            if let Err(e) = sink.send(WsMessage::Text(json.into())).await {
                                return AttemptEnd::Lost(format!("send failed: {e}"));
                            }
                        }
                        Err(e) => warn!(error = %e, kind = %envelope.kind, "Dropping unencodable envelope"),
                    }
                }
                // Every handle is gone.
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return AttemptEnd::Shutdown;
                }
            },

            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(adopted) = handle_frame(text.as_str(), &ctx.event_tx) {
                        *session = Some(adopted.clone());
                        ctx.session_tx.send_replace(Some(adopted));
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    return AttemptEnd::Lost("relay closed the connection".into());
                }
                Some(Err(e)) => return AttemptEnd::Lost(format!("websocket error: {e}")),
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Read frames until the Hub confirms registration. Relayed envelopes
/// that arrive first are still delivered.
async fn read_confirmation(
    source: &mut WsSource,
    event_tx: &mpsc::Sender<ClientEvent>,
) -> Result<(String, SessionId), String> {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match Incoming::parse(text.as_str()) {
                Ok(Incoming::Hub(HubMessage::Registered {
                    connection_id,
                    session_id,
                })) => return Ok((connection_id, SessionId::from(session_id))),
                Ok(Incoming::App(envelope)) => {
                    emit(event_tx, ClientEvent::Message(envelope));
                }
                Ok(Incoming::Hub(other)) => debug!(?other, "Hub notice before registration"),
                Err(e) => debug!(error = %e, "Ignoring unparseable frame"),
            },
            Ok(WsMessage::Close(_)) => return Err("relay closed during registration".into()),
            Ok(_) => {}
            Err(e) => return Err(format!("websocket error during registration: {e}")),
        }
    }
    Err("relay closed during registration".into())
}

/// Turn one Active-state frame into an event. Returns a session id when
/// the Hub confirms a new registration for this connection.
fn handle_frame(text: &str, event_tx: &mpsc::Sender<ClientEvent>) -> Option<SessionId> {
    let event = match Incoming::parse(text) {
        Ok(Incoming::App(envelope)) => ClientEvent::Message(envelope),
        Ok(Incoming::Hub(HubMessage::Registered {
            connection_id,
            session_id,
        })) => {
            let session_id = SessionId::from(session_id);
            emit(
                event_tx,
                ClientEvent::Registered {
                    connection_id,
                    session_id: session_id.clone(),
                },
            );
            return Some(session_id);
        }
        Ok(Incoming::Hub(HubMessage::PeerJoined {
            connection_id,
            role,
            ..
        })) => ClientEvent::PeerJoined {
            connection_id,
            role,
        },
        Ok(Incoming::Hub(HubMessage::PeerLeft {
            connection_id,
            role,
            ..
        })) => ClientEvent::PeerLeft {
            connection_id,
            role,
        },
        Err(e) => {
            debug!(error = %e, "Ignoring unparseable frame");
            return None;
        }
    };
    emit(event_tx, event);
    None
}

/// Hand an event to the application without waiting. A reader that falls
/// behind loses events instead of stalling the socket and the reconnects.
fn emit(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    if let Err(TrySendError::Full(_)) = event_tx.try_send(event) {
        warn!("Event channel full, dropping client event");
    }
}
