//! End-to-end tests: a real Hub on an ephemeral port, driven by raw
//! WebSocket clients and by `SessionClient`.

use std::time::Duration;

use boothlink_client::{ClientEvent, SessionClient, SessionClientConfig};
use boothlink_common::{ConnectionId, Role, SessionId};
use boothlink_config::{BoothlinkConfig, SessionPolicy};
use boothlink_relay::ServerHandle;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

async fn boot(policy: SessionPolicy) -> ServerHandle {
    let mut config = BoothlinkConfig::default();
    config.hub.host = "127.0.0.1".into();
    config.hub.port = 0;
    config.session = policy;
    boothlink_relay::start(&config).await.unwrap()
}

fn ws_url(server: &ServerHandle, path: &str) -> String {
    format!("ws://{}{}", server.addr, path)
}

struct Peer {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Peer {
    async fn connect(server: &ServerHandle) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(ws_url(server, "/ws"))
            .await
            .unwrap();
        Self { ws }
    }

    async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.into())).await.unwrap();
    }

    async fn send(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Next text frame, as received.
    async fn recv_text(&mut self) -> String {
        loop {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("socket closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return text.to_string();
            }
        }
    }

    async fn recv(&mut self) -> Value {
        serde_json::from_str(&self.recv_text().await).unwrap()
    }

    /// Assert nothing arrives for a short while.
    async fn expect_silence(&mut self) {
        match tokio::time::timeout(QUIET, self.ws.next()).await {
            Err(_) => {}
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }

    /// Register and return the confirmation.
    async fn register(&mut self, role: &str, session: &str) -> Value {
        self.send(json!({"type": "register", "role": role, "sessionId": session}))
            .await;
        let reply = self.recv().await;
        assert_eq!(reply["type"], "registered");
        reply
    }
}

#[tokio::test]
async fn end_to_end_booth_scenario() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;

    let reply = a.register("control", "").await;
    let x = reply["sessionId"].as_str().unwrap().to_string();
    assert!(!x.is_empty());
    assert!(reply["connectionId"].is_string());

    let reply = b.register("hub", &x).await;
    assert_eq!(reply["sessionId"], x.as_str());

    let photo = json!({"type": "photo", "sessionId": x, "data": "abc"});
    a.send(photo.clone()).await;
    assert_eq!(b.recv().await, photo);
    a.expect_silence().await;

    let end = format!(r#"{{"type":"end-session","sessionId":"{x}"}}"#);
    b.send_text(&end).await;
    assert_eq!(a.recv_text().await, end);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn fan_out_reaches_exactly_the_other_members() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;
    let mut c = Peer::connect(&server).await;
    let mut d = Peer::connect(&server).await;
    a.register("control", "S").await;
    b.register("hub", "S").await;
    c.register("hub", "S").await;
    d.register("hub", "T").await;

    let raw = r#"{"type":"control-fullscreen","sessionId":"S","extra":{"nested":[1,2,3]}}"#;
    a.send_text(raw).await;

    assert_eq!(b.recv_text().await, raw);
    assert_eq!(c.recv_text().await, raw);
    a.expect_silence().await;
    d.expect_silence().await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn generated_session_ids_are_distinct() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;

    a.send(json!({"type": "register", "role": "control"})).await;
    b.send(json!({"type": "register", "role": "control", "sessionId": null}))
        .await;
    let sa = a.recv().await["sessionId"].as_str().unwrap().to_string();
    let sb = b.recv().await["sessionId"].as_str().unwrap().to_string();
    assert!(!sa.is_empty());
    assert_ne!(sa, sb);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_frame_does_not_disturb_anyone() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;
    let mut c = Peer::connect(&server).await;
    a.register("control", "S").await;
    b.register("hub", "S").await;
    c.register("hub", "S").await;

    a.send_text("this is not json").await;
    a.send_text(r#"{"no_type":true,"sessionId":"S"}"#).await;
    b.expect_silence().await;

    b.send(json!({"type": "log", "sessionId": "S", "line": "still here"}))
        .await;
    assert_eq!(c.recv().await["line"], "still here");
    assert_eq!(a.recv().await["line"], "still here");

    // a is still connected and can still send.
    a.send(json!({"type": "start-session", "sessionId": "S"})).await;
    assert_eq!(b.recv().await["type"], "start-session");
    assert_eq!(c.recv().await["type"], "start-session");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn closed_recipient_does_not_stop_the_broadcast() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;
    let mut c = Peer::connect(&server).await;
    a.register("control", "S").await;
    b.register("hub", "S").await;
    c.register("hub", "S").await;

    b.ws.close(None).await.unwrap();
    drop(b);

    a.send(json!({"type": "photo", "sessionId": "S", "data": "abc"}))
        .await;
    assert_eq!(c.recv().await["data"], "abc");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unregistered_connection_is_not_routed() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;
    b.register("hub", "S").await;

    a.send(json!({"type": "photo", "sessionId": "S"})).await;
    b.expect_silence().await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn root_path_also_upgrades() {
    let server = boot(SessionPolicy::default()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(ws_url(&server, "/"))
        .await
        .unwrap();
    ws.send(Message::Text(
        json!({"type": "register", "role": "pc", "sessionId": "S"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let frame = tokio::time::timeout(WAIT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(reply["sessionId"], "S");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn peer_notices_when_enabled() {
    let policy = SessionPolicy {
        notify_peer_joined: true,
        notify_peer_left: true,
        ..SessionPolicy::default()
    };
    let server = boot(policy).await;
    let mut a = Peer::connect(&server).await;
    let mut b = Peer::connect(&server).await;
    a.register("hub", "S").await;
    let reply = b.register("control", "S").await;
    let b_id = reply["connectionId"].as_str().unwrap().to_string();

    let joined = a.recv().await;
    assert_eq!(joined["type"], "peer-joined");
    assert_eq!(joined["connectionId"], b_id.as_str());

    b.ws.close(None).await.unwrap();
    let left = a.recv().await;
    assert_eq!(left["type"], "peer-left");
    assert_eq!(left["connectionId"], b_id.as_str());
    assert_eq!(left["role"], "control");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_open_sockets() {
    let server = boot(SessionPolicy::default()).await;
    let mut a = Peer::connect(&server).await;
    a.register("control", "S").await;

    server.shutdown().await.unwrap();

    let end = tokio::time::timeout(WAIT, async {
        loop {
            match a.ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok());
}

// ---------------------------------------------------------------------------
// SessionClient against a live Hub
// ---------------------------------------------------------------------------

fn client_config(server: &ServerHandle, role: Role) -> SessionClientConfig {
    let mut config = SessionClientConfig::new(ws_url(server, "/"), role);
    config.reconnect_initial = Duration::from_millis(100);
    config.reconnect_max = Duration::from_millis(500);
    config
}

async fn next_registered(
    events: &mut tokio::sync::mpsc::Receiver<ClientEvent>,
) -> (String, SessionId) {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(ClientEvent::Registered {
                    connection_id,
                    session_id,
                }) => return (connection_id, session_id),
                Some(_) => {}
                None => panic!("client stopped"),
            }
        }
    })
    .await
    .expect("timed out waiting for registration")
}

async fn next_message(
    events: &mut tokio::sync::mpsc::Receiver<ClientEvent>,
) -> boothlink_common::Envelope {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(ClientEvent::Message(envelope)) => return envelope,
                Some(_) => {}
                None => panic!("client stopped"),
            }
        }
    })
    .await
    .expect("timed out waiting for a message")
}

#[tokio::test]
async fn client_adopts_assigned_session_and_stamps_sends() {
    let server = boot(SessionPolicy::default()).await;
    let (client, mut events) = SessionClient::connect(client_config(&server, Role::Control));

    let (_, session) = next_registered(&mut events).await;
    assert_eq!(client.session_id(), Some(session.clone()));
    assert_eq!(client.wait_until_registered().await.unwrap(), session);

    let mut hub_side = Peer::connect(&server).await;
    hub_side.register("hub", session.as_str()).await;

    let mut body = serde_json::Map::new();
    let _ = body.insert("filename".into(), json!("a.jpg"));
    let _ = body.insert("data".into(), json!("data:image/jpeg;base64,AAAA"));
    client.send("photo", body).unwrap();

    let got = hub_side.recv().await;
    assert_eq!(got["type"], "photo");
    assert_eq!(got["sessionId"], session.as_str());
    assert_eq!(got["filename"], "a.jpg");

    hub_side
        .send(json!({"type": "control-session-done", "sessionId": session.as_str()}))
        .await;
    assert_eq!(next_message(&mut events).await.kind, "control-session-done");

    // Unknown kinds are delivered, not rejected.
    hub_side
        .send(json!({"type": "some-future-kind", "sessionId": session.as_str()}))
        .await;
    assert_eq!(next_message(&mut events).await.kind, "some-future-kind");

    client.shutdown().await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_reconnects_into_the_same_session() {
    let server = boot(SessionPolicy::default()).await;
    let config = client_config(&server, Role::Hub).with_session(SessionId::from("booth-9"));
    let (client, mut events) = SessionClient::connect(config);

    let (first_conn, session) = next_registered(&mut events).await;
    assert_eq!(session, SessionId::from("booth-9"));

    // Drop the transport from the Hub side.
    assert!(
        server
            .hub()
            .disconnect(&ConnectionId::from(first_conn.as_str()))
            .await
    );

    let (second_conn, session) = next_registered(&mut events).await;
    assert_ne!(first_conn, second_conn);
    assert_eq!(session, SessionId::from("booth-9"));
    client.wait_until_registered().await.unwrap();

    // Traffic flows again on the new connection.
    let mut control = Peer::connect(&server).await;
    control.register("control", "booth-9").await;
    control
        .send(json!({"type": "photo", "sessionId": "booth-9", "data": "abc"}))
        .await;
    let envelope = next_message(&mut events).await;
    assert_eq!(envelope.kind, "photo");
    assert_eq!(envelope.session(), Some("booth-9"));

    client.shutdown().await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_keeps_assigned_session_across_reconnects() {
    let server = boot(SessionPolicy::default()).await;
    let (client, mut events) = SessionClient::connect(client_config(&server, Role::Control));

    let (conn, assigned) = next_registered(&mut events).await;
    server
        .hub()
        .disconnect(&ConnectionId::from(conn.as_str()))
        .await;

    let (_, again) = next_registered(&mut events).await;
    assert_eq!(again, assigned);

    client.shutdown().await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_survives_hub_restart_window() {
    // Start the client before any Hub exists on the port.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let mut config = SessionClientConfig::new(format!("ws://127.0.0.1:{port}"), Role::Control);
    config.reconnect_initial = Duration::from_millis(100);
    config.reconnect_max = Duration::from_millis(200);
    let (client, mut events) = SessionClient::connect(config);

    let failure = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(failure, ClientEvent::Error(_)));

    let mut hub_config = BoothlinkConfig::default();
    hub_config.hub.host = "127.0.0.1".into();
    hub_config.hub.port = port;
    let server = boothlink_relay::start(&hub_config).await.unwrap();

    let (_, session) = next_registered(&mut events).await;
    assert!(!session.as_str().is_empty());
    assert!(client.is_registered());

    client.shutdown().await;
    server.shutdown().await.unwrap();
}
