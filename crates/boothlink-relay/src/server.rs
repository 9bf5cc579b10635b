//! HTTP surface of the Hub: WebSocket upgrade on `/` and `/ws`, plus a
//! JSON health probe.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use boothlink_config::BoothlinkConfig;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::handle_socket;
use crate::hub::Hub;
use crate::reaper;

/// Plain-text reply for non-upgrade requests to `/`.
pub const LIVENESS_TEXT: &str = "Boothlink relay running";

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
    pub sessions: usize,
    pub uptime_secs: u64,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind, then serve until the returned handle is shut down.
pub async fn start(config: &BoothlinkConfig) -> Result<ServerHandle, std::io::Error> {
    let hub = Arc::new(Hub::new(config.hub.clone(), config.session.clone()));
    let shutdown = CancellationToken::new();

    let state = AppState {
        hub: Arc::clone(&hub),
        shutdown: shutdown.clone(),
        started_at: Instant::now(),
    };

    let listener = TcpListener::bind(config.hub.bind_addr()).await?;
    let addr = listener.local_addr()?;

    let reaper = config.session.idle_ttl().map(|ttl| {
        reaper::spawn(
            Arc::clone(&hub),
            ttl,
            config.session.reap_interval(),
            shutdown.clone(),
        )
    });

    let router = build_router(state);
    let graceful = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                graceful.cancelled().await;
                tracing::info!("Relay shutting down gracefully");
            })
            .await
    });

    tracing::info!(%addr, "Boothlink relay listening");

    Ok(ServerHandle {
        addr,
        hub,
        shutdown,
        server,
        reaper,
    })
}

/// Handle returned by [`start`]; keeps the server task and reaper alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown: CancellationToken,
    server: JoinHandle<Result<(), std::io::Error>>,
    reaper: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Token that stops the server, and every connection, when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Close every connection and wait for the server to finish.
    pub async fn shutdown(self) -> Result<(), std::io::Error> {
        self.shutdown.cancel();
        self.wait().await
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) -> Result<(), std::io::Error> {
        let result = match self.server.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        };
        if let Some(reaper) = self.reaper {
            reaper.abort();
        }
        result
    }
}

/// `/` upgrades when asked to and otherwise answers with a liveness line.
async fn root_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Ok(ws) => upgrade(ws, state),
        Err(_) => LIVENESS_TEXT.into_response(),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state)
}

fn upgrade(ws: WebSocketUpgrade, state: AppState) -> Response {
    let limit = state.hub.config().max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state.hub, state.shutdown))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.hub.registry();
    Json(HealthResponse {
        status: "ok",
        connections: registry.connection_count().await,
        sessions: registry.session_count().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
