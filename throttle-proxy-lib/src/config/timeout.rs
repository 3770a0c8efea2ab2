use serde::Deserialize;

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Upstream connect timeout in milliseconds
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    /// Upstream request timeout in milliseconds
    /// Covers sending the request and receiving the response head.
    /// An expired timeout is answered with 502, the request is not retried
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_ms: u64,
    /// Graceful shutdown timeout in seconds
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
    /// Total connection handling timeout in seconds
    /// Maximum time a single inbound connection may stay open
    /// Default: 300 seconds (5 minutes)
    #[serde(default = "default_connection_handling_timeout")]
    pub connection_handling_secs: u64,
    /// HTTP/1.1 keep-alive configuration
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            upstream_ms: default_upstream_timeout(),
            shutdown_secs: default_shutdown_timeout(),
            connection_handling_secs: default_connection_handling_timeout(),
            keep_alive: KeepAliveConfig::default(),
        }
    }
}

/// HTTP/1.1 keep-alive configuration
///
/// Applies to both sides of the proxy: inbound client connections may be
/// reused for several requests, and the upstream client pool keeps idle
/// connections for `timeout_secs`.
#[derive(Debug, Deserialize, Clone)]
pub struct KeepAliveConfig {
    /// Enable HTTP/1.1 keep-alive (persistent connections)
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long idle connections are kept open, in seconds
    /// Default: 60 seconds
    #[serde(default = "default_keep_alive_timeout")]
    pub timeout_secs: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self { enabled: true, timeout_secs: default_keep_alive_timeout() }
    }
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_upstream_timeout() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_connection_handling_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_keep_alive_timeout() -> u64 {
    60
}
