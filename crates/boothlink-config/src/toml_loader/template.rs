//! Commented default config file content.

/// Generate the default TOML config content with comments.
pub(super) fn default_config_toml() -> &'static str {
    r##"# Boothlink Configuration
# Only override what you want to change -- missing fields use defaults.

[hub]
# host = "0.0.0.0"
# port = 3000                      # PORT / BOOTHLINK_PORT override this
# outbound_queue = 256             # 1-65536 frames per connection
# max_message_bytes = 16777216     # photos travel as data URLs
# write_timeout_secs = 10
# heartbeat_interval_secs = 30     # 0 disables heartbeat
# heartbeat_timeout_secs = 90

[session]
# notify_peer_joined = false
# notify_peer_left = false
# idle_session_ttl_secs = 0        # 0 = sessions never expire
# reap_interval_secs = 60

[endpoint]
# url = "ws://127.0.0.1:3000"      # BOOTHLINK_URL overrides this
# role = "control"                 # control, hub
# session_id = ""                  # empty asks the hub for one
# reconnect_initial_secs = 2       # at least 2
# reconnect_max_secs = 30
# connect_timeout_secs = 15
# register_timeout_secs = 10
# outbound_queue = 64

[logging]
# level = "info"                   # trace, debug, info, warn, error
"##
}
