use serde::Deserialize;

/// Security configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Maximum number of concurrent connections allowed
    /// Connections above the limit are closed right after accept
    /// Default: 512
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { max_connections: default_max_connections() }
    }
}

fn default_max_connections() -> usize {
    512
}
