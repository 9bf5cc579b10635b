//! boothlink-endpoint: a terminal participant in a relay session.
//!
//! Every event is printed to stdout as one JSON line. Every stdin line is
//! parsed as an envelope and sent through the session once registered.
//! Logs go to stderr.

use std::future::Future;
use std::path::PathBuf;

use boothlink_client::{ClientEvent, SessionClient, SessionClientConfig};
use boothlink_common::{BoothlinkError, Envelope};
use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "boothlink-endpoint",
    version,
    about = "Join a boothlink relay session from the terminal"
)]
struct Args {
    /// Path to a TOML config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hub WebSocket URL, e.g. ws://127.0.0.1:3000.
    #[arg(long)]
    url: Option<String>,

    /// Role to register as: control or hub.
    #[arg(long)]
    role: Option<String>,

    /// Session to join. Omit to let the Hub assign one.
    #[arg(long)]
    session: Option<String>,

    /// Log level or filter directive.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), BoothlinkError> {
    let args = Args::parse();
    let mut config = boothlink_config::load_config(args.config.as_deref())?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("warn,boothlink_client={level},boothlink_endpoint={level}").into()
            }),
        )
        .init();

    if let Some(url) = args.url {
        config.endpoint.url = url;
    }
    if let Some(role) = args.role {
        config.endpoint.role = role;
    }
    if let Some(session) = args.session {
        config.endpoint.session_id = session;
    }

    let client_config = SessionClientConfig::from_endpoint(&config.endpoint)?;
    let (client, mut events) = SessionClient::connect(client_config);

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Interrupted");
    };
    pump(
        &client,
        &mut events,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        interrupted,
    )
    .await?;

    client.shutdown().await;
    Ok(())
}

/// Print events to `output` and send `input` lines until `stop` resolves
/// or the client goes away. Input is only read while the client is Active,
/// so lines piped in early wait for registration.
async fn pump<I, O, S>(
    client: &SessionClient,
    events: &mut mpsc::Receiver<ClientEvent>,
    input: I,
    mut output: O,
    stop: S,
) -> std::io::Result<()>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut lines = input.lines();
    let mut input_open = true;
    let mut state = client.watch_state();

    loop {
        let registered = client.is_registered();
        tokio::select! {
            () = &mut stop => break,

            event = events.recv() => {
                let Some(event) = event else { break };
                let line = event_line(&event).to_string();
                output.write_all(line.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }

            line = lines.next_line(), if input_open && registered => match line? {
                Some(line) => send_line(client, &line),
                // Keep printing events after input closes.
                None => input_open = false,
            },

            // Re-evaluates the input gate.
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn send_line(client: &SessionClient, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let envelope = match Envelope::parse(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping input line");
            return;
        }
    };
    if let Err(e) = client.send_envelope(envelope) {
        tracing::warn!(error = %e, "Envelope not sent");
    }
}

/// JSON rendering of one client event for stdout.
fn event_line(event: &ClientEvent) -> Value {
    match event {
        ClientEvent::Connected => json!({"event": "connected"}),
        ClientEvent::Registered {
            connection_id,
            session_id,
        } => json!({
            "event": "registered",
            "connectionId": connection_id,
            "sessionId": session_id,
        }),
        ClientEvent::Message(envelope) => json!({"event": "message", "envelope": envelope}),
        ClientEvent::PeerJoined {
            connection_id,
            role,
        } => json!({"event": "peer-joined", "connectionId": connection_id, "role": role}),
        ClientEvent::PeerLeft {
            connection_id,
            role,
        } => json!({"event": "peer-left", "connectionId": connection_id, "role": role}),
        ClientEvent::Disconnected => json!({"event": "disconnected"}),
        ClientEvent::Error(message) => json!({"event": "error", "message": message}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boothlink_common::{Role, SessionId};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    #[test]
    fn registered_event_line() {
        let line = event_line(&ClientEvent::Registered {
            connection_id: "c1".into(),
            session_id: SessionId::from("X"),
        });
        assert_eq!(
            line,
            json!({"event": "registered", "connectionId": "c1", "sessionId": "X"})
        );
    }

    #[test]
    fn message_event_line_embeds_envelope() {
        let envelope = Envelope::new("photo")
            .with_session("X")
            .with_field("data", "abc");
        let line = event_line(&ClientEvent::Message(envelope));
        assert_eq!(line["event"], "message");
        assert_eq!(
            line["envelope"],
            json!({"type": "photo", "sessionId": "X", "data": "abc"})
        );
    }

    /// Hub stand-in: confirms registration after a delay, then returns the
    /// next frame the endpoint sends.
    async fn confirm_late_then_capture(listener: tokio::net::TcpListener) -> String {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let register = ws.next().await.unwrap().unwrap();
        assert!(register.to_text().unwrap().contains("register"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        let confirm = json!({"type": "registered", "connectionId": "c1", "sessionId": "S"});
        ws.send(WsMessage::Text(confirm.to_string().into()))
            .await
            .unwrap();

        loop {
            if let WsMessage::Text(text) = ws.next().await.unwrap().unwrap() {
                return text.as_str().to_string();
            }
        }
    }

    #[tokio::test]
    async fn input_sent_before_registration_is_delivered() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let hub = tokio::spawn(confirm_late_then_capture(listener));

        let (client, mut events) = SessionClient::connect(SessionClientConfig::new(url, Role::Hub));
        let input: &[u8] = b"{\"type\":\"photo\",\"data\":\"abc\"}\n";
        let (done_tx, done_rx) = oneshot::channel::<String>();
        let stop = async move {
            let frame = hub.await.unwrap();
            let _ = done_tx.send(frame);
        };

        tokio::time::timeout(
            Duration::from_secs(10),
            pump(&client, &mut events, input, tokio::io::sink(), stop),
        )
        .await
        .unwrap()
        .unwrap();

        let sent: Value = serde_json::from_str(&done_rx.await.unwrap()).unwrap();
        assert_eq!(sent["type"], "photo");
        assert_eq!(sent["data"], "abc");
        assert_eq!(sent["sessionId"], "S");
        client.shutdown().await;
    }

    #[test]
    fn peer_event_lines() {
        let line = event_line(&ClientEvent::PeerLeft {
            connection_id: "c2".into(),
            role: Role::Hub,
        });
        assert_eq!(line["event"], "peer-left");
        assert_eq!(line["role"], "hub");
    }
}
