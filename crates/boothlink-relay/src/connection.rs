//! Per-socket task: drains the outbound queue, feeds inbound frames to the
//! Hub, and keeps the link alive with pings.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::hub::{Accepted, Dispatch, Hub};

/// Run one accepted WebSocket until either side closes it.
pub async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, shutdown: CancellationToken) {
    let Accepted {
        handle,
        mut outbound,
    } = hub.accept(&shutdown).await;
    let conn = handle.id.clone();
    let cancel = handle.cancel_token().clone();
    drop(handle);

    let write_timeout = hub.config().write_timeout();
    let heartbeat = hub.config().heartbeat();
    let mut ping = heartbeat.map(|(interval, _)| {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut last_seen = Instant::now();

    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = write(&mut sink, Message::Close(None), write_timeout).await;
                break "closed by hub";
            }

            // Frames routed to us by other members of the session.
            Some(frame) = outbound.recv() => {
                if let Err(reason) = write(&mut sink, Message::Text(frame), write_timeout).await {
                    break reason;
                }
            }

            () = next_tick(&mut ping) => {
                if let Some((_, limit)) = heartbeat {
                    if last_seen.elapsed() > limit {
                        break "heartbeat timeout";
                    }
                }
                if let Err(reason) = write(&mut sink, Message::Ping(Bytes::new()), write_timeout).await {
                    break reason;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        if let Dispatch::Reply(reply) = hub.handle_frame(&conn, text).await {
                            if let Err(reason) = write(&mut sink, Message::Text(reply), write_timeout).await {
                                break reason;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        last_seen = Instant::now();
                        tracing::debug!(conn = %conn, "Ignoring binary frame");
                    }
                    // Pings are answered by the socket itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break "closed by peer",
                    Some(Err(e)) => {
                        tracing::debug!(conn = %conn, error = %e, "WS error");
                        break "socket error";
                    }
                }
            }
        }
    };

    hub.close(&conn).await;
    tracing::info!(conn = %conn, reason, "Connection closed");
}

/// Write one message, giving up after `limit`.
async fn write<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), &'static str>
where
    S: Sink<Message> + Unpin,
{
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err("write failed"),
        Err(_) => Err("write timed out"),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            let _ = ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
