use crate::config::Route;
use crate::error::{ProxyError, Result};
use crate::load_balancing::RoundRobin;
use crate::routing::{parse_target, Target};

/// One configured route: a path prefix and the targets it forwards to.
#[derive(Debug)]
pub struct RouteEntry {
    prefix: String,
    targets: Vec<Target>,
    rotation: RoundRobin,
}

impl RouteEntry {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Target for the next request on this route. Single-target routes
    /// always return the same target.
    pub fn next_target(&self) -> &Target {
        // Construction guarantees at least one target.
        self.rotation.pick(&self.targets).unwrap_or(&self.targets[0])
    }
}

/// The route and target chosen for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub prefix: &'a str,
    pub target: &'a Target,
}

/// Ordered, immutable set of routes with longest-prefix lookup.
///
/// Matching is a plain string prefix test: `/api` matches `/api/users` and
/// also `/apiv2`. When several prefixes match, the longest wins; prefixes of
/// equal length keep configuration order.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(routes: &[Route]) -> Result<Self> {
        if routes.is_empty() {
            return Err(ProxyError::NoRoutes);
        }

        let mut entries = Vec::with_capacity(routes.len());
        for (i, route) in routes.iter().enumerate() {
            if route.path.is_empty() {
                return Err(ProxyError::Config(format!("routes[{i}].path cannot be empty")));
            }
            let targets = route
                .targets()
                .map(|raw| {
                    parse_target(raw).map_err(|reason| {
                        ProxyError::Config(format!(
                            "routes[{i}]: invalid target URL for path {}: {reason}",
                            route.path
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            entries.push(RouteEntry {
                prefix: route.path.clone(),
                targets,
                rotation: RoundRobin::new(),
            });
        }

        Ok(Self { entries })
    }

    /// Best route for `path`, or `None` if no prefix matches.
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.entries {
            if !path.starts_with(entry.prefix.as_str()) {
                continue;
            }
            match best {
                Some(current) if current.prefix.len() >= entry.prefix.len() => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    /// Resolve `path` and pick the target for this request.
    pub fn route(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.resolve(path)
            .map(|entry| RouteMatch { prefix: entry.prefix(), target: entry.next_target() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}
