use serde::Deserialize;

/// Route configuration for path-prefix routing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Route {
    /// URL path prefix to match (e.g., "/api", "/api/v2")
    /// Matching is a plain string prefix test, so "/api" also matches "/apiv2"
    /// Must not be empty
    pub path: String,
    /// Upstream base URL that matching requests are forwarded to
    /// Example: "http://localhost:8000" or "http://10.0.0.5:9000/base"
    /// The full request path is appended to the base, no prefix stripping
    pub target: String,
    /// Additional upstream base URLs for this route (optional)
    /// When present, requests rotate round-robin over `target` followed by these
    /// Default: empty (single target)
    #[serde(default)]
    pub upstreams: Vec<String>,
}

impl Route {
    pub fn new(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self { path: path.into(), target: target.into(), upstreams: Vec::new() }
    }

    /// All targets of this route in rotation order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.target.as_str()).chain(self.upstreams.iter().map(String::as_str))
    }
}
