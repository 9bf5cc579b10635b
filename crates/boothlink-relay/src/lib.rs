//! boothlink-relay: WebSocket Hub for photo booth sessions.
//!
//! Endpoints register into a session and the Hub forwards every frame
//! they send, unchanged, to the other members of that session. The Hub
//! never inspects payloads beyond `type`, `sessionId` and `role`.

pub mod connection;
pub mod hub;
pub mod protocol;
pub mod reaper;
pub mod registry;
pub mod server;

pub use hub::{Dispatch, DropReason, Hub};
pub use registry::{ConnectionRegistry, Delivery, Frame};
pub use server::{start, ServerHandle};
