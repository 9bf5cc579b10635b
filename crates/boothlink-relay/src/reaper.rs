//! Background task closing sessions that have gone quiet.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;

/// Every `every`, close sessions idle for longer than `ttl`. Stops when
/// `shutdown` is cancelled.
pub fn spawn(
    hub: Arc<Hub>,
    ttl: Duration,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(every) => {
                    let reaped = hub.reap_idle(ttl).await;
                    let sessions = hub.registry().session_count().await;
                    tracing::debug!(reaped, sessions, "Reaper tick");
                }
            }
        }
    })
}
