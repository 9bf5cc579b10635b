//! Per-section validators.

use crate::schema::BoothlinkConfig;

use super::helpers::{validate_one_of, validate_range};

/// Shortest reconnect delay allowed from a config file.
pub(crate) const MIN_RECONNECT_SECS: u64 = 2;

pub(crate) fn validate_hub(errors: &mut Vec<String>, config: &BoothlinkConfig) {
    let hub = &config.hub;
    if hub.host.trim().is_empty() {
        errors.push("hub.host must not be empty".into());
    }
    validate_range(errors, "hub.outbound_queue", hub.outbound_queue, 1, 65_536);
    validate_range(
        errors,
        "hub.max_message_bytes",
        hub.max_message_bytes,
        1024,
        256 * 1024 * 1024,
    );
    validate_range(errors, "hub.write_timeout_secs", hub.write_timeout_secs, 1, 300);
    if hub.heartbeat_interval_secs > 0 && hub.heartbeat_timeout_secs < hub.heartbeat_interval_secs
    {
        errors.push(format!(
            "hub.heartbeat_timeout_secs = {} must be at least hub.heartbeat_interval_secs = {}",
            hub.heartbeat_timeout_secs, hub.heartbeat_interval_secs
        ));
    }
}

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &BoothlinkConfig) {
    validate_range(
        errors,
        "session.reap_interval_secs",
        config.session.reap_interval_secs,
        1,
        86_400,
    );
}

pub(crate) fn validate_endpoint(errors: &mut Vec<String>, config: &BoothlinkConfig) {
    let ep = &config.endpoint;
    if !(ep.url.starts_with("ws://") || ep.url.starts_with("wss://")) {
        errors.push(format!("endpoint.url = {:?} must start with ws:// or wss://", ep.url));
    }
    validate_one_of(errors, "endpoint.role", &ep.role, &["control", "hub", "pc"]);
    validate_range(
        errors,
        "endpoint.reconnect_initial_secs",
        ep.reconnect_initial_secs,
        MIN_RECONNECT_SECS,
        3600,
    );
    if ep.reconnect_max_secs < ep.reconnect_initial_secs {
        errors.push(format!(
            "endpoint.reconnect_max_secs = {} must be at least endpoint.reconnect_initial_secs = {}",
            ep.reconnect_max_secs, ep.reconnect_initial_secs
        ));
    }
    validate_range(errors, "endpoint.connect_timeout_secs", ep.connect_timeout_secs, 1, 300);
    validate_range(errors, "endpoint.register_timeout_secs", ep.register_timeout_secs, 1, 300);
    validate_range(errors, "endpoint.outbound_queue", ep.outbound_queue, 1, 65_536);
}

pub(crate) fn validate_logging(errors: &mut Vec<String>, config: &BoothlinkConfig) {
    let level = config.logging.level.to_ascii_lowercase();
    validate_one_of(
        errors,
        "logging.level",
        &level,
        &["trace", "debug", "info", "warn", "error"],
    );
}
