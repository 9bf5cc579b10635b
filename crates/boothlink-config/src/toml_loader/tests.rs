//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use crate::schema::BoothlinkConfig;
use boothlink_common::ConfigError;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_boothlink_config.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[hub]
port = 8099
heartbeat_interval_secs = 0

[endpoint]
role = "hub"
session_id = "booth-1"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.hub.port, 8099);
    assert_eq!(config.hub.heartbeat_interval_secs, 0);
    assert_eq!(config.endpoint.role, "hub");
    assert_eq!(config.endpoint.session_id, "booth-1");
    // Defaults preserved
    assert_eq!(config.hub.outbound_queue, 256);
    assert_eq!(config.endpoint.reconnect_max_secs, 30);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let result = load_from_path(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn load_out_of_range_values_still_returns_parsed_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[endpoint]\nreconnect_initial_secs = 0\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.endpoint.reconnect_initial_secs, 0);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boothlink").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.hub.port, 3000);
    assert_eq!(config.endpoint.url, "ws://127.0.0.1:3000");
}

#[test]
fn default_config_toml_is_valid() {
    let config: BoothlinkConfig = toml::from_str(template::default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_is_reasonable() {
    // Some CI environments have no config dir.
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("boothlink"));
        assert!(path_str.ends_with("config.toml"));
    }
}
