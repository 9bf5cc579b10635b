//! Boothlink configuration system.
//!
//! TOML-based configuration for the relay Hub and for endpoints. Every
//! section uses serde defaults, so an empty or partial file is valid.

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{BoothlinkConfig, EndpointConfig, HubConfig, LoggingConfig, SessionPolicy};

use std::path::Path;

use boothlink_common::ConfigError;

/// Load config from `path` if given, otherwise from the platform default
/// location, then apply environment overrides.
///
/// Validation problems are logged by the loader; only read and parse
/// failures are returned as errors.
pub fn load_config(path: Option<&Path>) -> Result<BoothlinkConfig, ConfigError> {
    let mut config = match path {
        Some(p) => toml_loader::load_from_path(p)?,
        None => toml_loader::load_default()?,
    };
    env::apply_env_overrides(&mut config);
    Ok(config)
}
