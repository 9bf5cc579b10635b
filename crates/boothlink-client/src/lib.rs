//! Endpoint session client for the boothlink relay.
//!
//! Keeps one logical connection to the Hub alive across transport drops:
//! connects, registers with a role and session, relays envelopes, and
//! reconnects with capped exponential backoff until shut down.

mod backoff;
mod client;
mod connection;
pub mod dispatch;
mod error;
mod types;

pub use backoff::Backoff;
pub use client::SessionClient;
pub use dispatch::Dispatcher;
pub use error::ClientError;
pub use types::{ClientEvent, ConnectionState, SessionClientConfig, MIN_CONFIGURED_DELAY};
