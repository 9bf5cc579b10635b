pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::{BoothlinkError, ConfigError, ProtocolError};
pub use id::{new_id, ConnectionId, SessionId};
pub use protocol::{Envelope, HubMessage, Incoming, RegisterRequest, Role};
