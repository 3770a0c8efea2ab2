use http::uri::{PathAndQuery, Scheme, Uri};
use std::fmt;

/// A validated upstream base URL such as `http://10.0.0.5:9000/base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: Scheme,
    authority: http::uri::Authority,
    base_path: String,
    raw: String,
}

/// Parse and validate an upstream base URL.
///
/// Only absolute `http` URLs with a host are accepted. The error is a short
/// human readable reason, callers add the field name.
pub fn parse_target(raw: &str) -> Result<Target, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("target is empty".to_string());
    }
    let uri: Uri = raw.parse().map_err(|e| format!("{e}"))?;

    let scheme = uri.scheme().cloned().ok_or("missing scheme")?;
    if scheme != Scheme::HTTP {
        return Err(format!("unsupported scheme {scheme}, only http is supported"));
    }
    let authority = uri.authority().cloned().ok_or("missing host")?;
    if authority.host().is_empty() {
        return Err("missing host".to_string());
    }
    if uri.query().is_some() {
        return Err("query strings are not allowed in targets".to_string());
    }

    let base_path = uri.path().trim_end_matches('/').to_string();
    Ok(Target { scheme, authority, base_path, raw: raw.to_string() })
}

impl Target {
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Upstream URI for a request whose path and query are `path_and_query`.
    ///
    /// The target's base path is joined with the request path using exactly
    /// one slash; the request path is never stripped.
    pub fn upstream_uri(&self, path_and_query: &str) -> Result<Uri, http::Error> {
        let request = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{path_and_query}")
        };
        let joined = format!("{}{}", self.base_path, request);
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::try_from(joined.as_str())?)
            .build()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
