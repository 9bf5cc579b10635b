//! Environment variable overrides applied on top of the file config.

use tracing::{info, warn};

use crate::schema::BoothlinkConfig;

/// Port override honoured by hosting platforms.
pub const PORT_VAR: &str = "PORT";
pub const BOOTHLINK_PORT_VAR: &str = "BOOTHLINK_PORT";
pub const BOOTHLINK_URL_VAR: &str = "BOOTHLINK_URL";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut BoothlinkConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` as the variable source.
///
/// `BOOTHLINK_PORT` wins over `PORT`. Unparseable values are ignored.
pub fn apply_overrides_from<F>(config: &mut BoothlinkConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for var in [PORT_VAR, BOOTHLINK_PORT_VAR] {
        if let Some(raw) = lookup(var) {
            match raw.trim().parse::<u16>() {
                Ok(port) => {
                    info!(var, port, "hub port overridden from environment");
                    config.hub.port = port;
                }
                Err(e) => warn!(var, value = %raw, error = %e, "ignoring invalid port override"),
            }
        }
    }

    if let Some(url) = lookup(BOOTHLINK_URL_VAR) {
        let url = url.trim();
        if url.is_empty() {
            warn!(var = BOOTHLINK_URL_VAR, "ignoring empty url override");
        } else {
            config.endpoint.url = url.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn apply(vars: &[(&str, &str)]) -> BoothlinkConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut config = BoothlinkConfig::default();
        apply_overrides_from(&mut config, |key| vars.get(key).cloned());
        config
    }

    #[test]
    fn no_vars_changes_nothing() {
        let config = apply(&[]);
        assert_eq!(config.hub.port, 3000);
        assert_eq!(config.endpoint.url, "ws://127.0.0.1:3000");
    }

    #[test]
    fn port_var_overrides_hub_port() {
        assert_eq!(apply(&[("PORT", "8080")]).hub.port, 8080);
    }

    #[test]
    fn boothlink_port_wins_over_port() {
        let config = apply(&[("PORT", "8080"), ("BOOTHLINK_PORT", "9090")]);
        assert_eq!(config.hub.port, 9090);
    }

    #[test]
    fn invalid_port_is_ignored() {
        assert_eq!(apply(&[("PORT", "eighty")]).hub.port, 3000);
        assert_eq!(apply(&[("PORT", "70000")]).hub.port, 3000);
    }

    #[test]
    fn url_override() {
        let config = apply(&[("BOOTHLINK_URL", "wss://relay.example.com")]);
        assert_eq!(config.endpoint.url, "wss://relay.example.com");
        let config = apply(&[("BOOTHLINK_URL", "  ")]);
        assert_eq!(config.endpoint.url, "ws://127.0.0.1:3000");
    }
}
