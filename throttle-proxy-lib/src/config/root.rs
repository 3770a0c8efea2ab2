use serde::Deserialize;
use std::net::SocketAddr;

use super::rate_limit::RateLimitConfig;
use super::route::Route;
use super::security::SecurityConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8080" or "127.0.0.1:9090"
    /// Default: "0.0.0.0:8080"
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Path-prefix routing rules
    /// The longest matching prefix wins; requests with no match return 404
    /// At least one route is required
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Per-client token bucket settings
    pub rate_limit: RateLimitConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Security configuration
    #[serde(default)]
    pub security: SecurityConfig,
    /// Telemetry configuration
    /// Controls metrics and the observability server
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
