use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::routing::parse_target;

/// Reject configurations the proxy cannot serve.
///
/// Error messages name the offending field.
pub fn validate(config: &Config) -> Result<()> {
    if config.routes.is_empty() {
        return Err(ProxyError::NoRoutes);
    }

    for (i, route) in config.routes.iter().enumerate() {
        if route.path.is_empty() {
            return Err(ProxyError::Config(format!("routes[{i}].path cannot be empty")));
        }
        if route.target.trim().is_empty() {
            return Err(ProxyError::Config(format!(
                "routes[{i}].target cannot be empty (path {})",
                route.path
            )));
        }
        parse_target(&route.target).map_err(|reason| {
            ProxyError::Config(format!(
                "routes[{i}].target: invalid target URL for path {}: {reason}",
                route.path
            ))
        })?;
        for (j, upstream) in route.upstreams.iter().enumerate() {
            parse_target(upstream).map_err(|reason| {
                ProxyError::Config(format!(
                    "routes[{i}].upstreams[{j}]: invalid target URL for path {}: {reason}",
                    route.path
                ))
            })?;
        }
    }

    let rl = &config.rate_limit;
    if let Some(rps) = rl.requests_per_second {
        if !rps.is_finite() || rps < 0.0 {
            return Err(ProxyError::Config(format!(
                "rate_limit.requests_per_second must be a positive number, got {rps}"
            )));
        }
    }
    if let Some(rpm) = rl.requests_per_minute {
        if !rpm.is_finite() || rpm < 0.0 {
            return Err(ProxyError::Config(format!(
                "rate_limit.requests_per_minute must be a positive number, got {rpm}"
            )));
        }
    }
    if !rl.has_explicit_rate() {
        return Err(ProxyError::Config(
            "rate_limit.requests_per_second or rate_limit.requests_per_minute must be > 0".into(),
        ));
    }
    if rl.burst == 0 {
        return Err(ProxyError::Config("rate_limit.burst must be > 0".into()));
    }
    if rl.idle_eviction_secs == Some(0) {
        return Err(ProxyError::Config("rate_limit.idle_eviction_secs must be > 0".into()));
    }

    if config.timeout.upstream_ms == 0 {
        return Err(ProxyError::Config("timeout.upstream_ms must be > 0".into()));
    }
    if config.timeout.connect_ms == 0 {
        return Err(ProxyError::Config("timeout.connect_ms must be > 0".into()));
    }
    if config.security.max_connections == 0 {
        return Err(ProxyError::Config("security.max_connections must be > 0".into()));
    }

    Ok(())
}
