//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod endpoint;
mod hub;
mod logging;
mod session;

pub use endpoint::*;
pub use hub::*;
pub use logging::*;
pub use session::*;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the relay binary and endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothlinkConfig {
    pub hub: HubConfig,
    pub session: SessionPolicy,
    pub endpoint: EndpointConfig,
    pub logging: LoggingConfig,
}
