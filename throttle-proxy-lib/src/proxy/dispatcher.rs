use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::routing::{RouteMatch, RouteTable};
use crate::security::rate_limit::{BucketRegistry, RateLimitError, RateLimitResult};

/// Value of the `Retry-After` header on 429 responses, in seconds.
pub const RETRY_AFTER_SECS: u64 = 1;

/// Terminal decision for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<'a> {
    /// The client's bucket is empty. No upstream is contacted.
    RateLimited { retry_after: Duration },
    /// Admitted, but no route prefix matches the path.
    RouteNotFound,
    /// Admitted and routed.
    Forwarded(RouteMatch<'a>),
}

impl Outcome<'_> {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Outcome::Forwarded(_))
    }
}

/// Admission first, routing second.
///
/// Holds shared handles to the bucket registry and the route table; both are
/// injected so several dispatchers (or tests) can share or isolate state.
/// Every lock taken here is released before `handle` returns, so forwarding
/// never runs under a rate limiter lock.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<BucketRegistry>,
    routes: Arc<RouteTable>,
}

impl Dispatcher {
    pub fn new(registry: Arc<BucketRegistry>, routes: Arc<RouteTable>) -> Self {
        Self { registry, routes }
    }

    pub fn registry(&self) -> &Arc<BucketRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Admission check only, for requests answered without routing.
    pub fn admit(&self, client_id: &str) -> Result<RateLimitResult, RateLimitError> {
        self.registry.check(client_id)
    }

    /// Decide what happens to a request of `client_id` for `path`.
    ///
    /// A denied request never touches the route table. Errors mean the rate
    /// limiter itself is broken, not that the client is limited.
    pub fn handle(&self, client_id: &str, path: &str) -> Result<Outcome<'_>, RateLimitError> {
        let admission = self.admit(client_id)?;
        Ok(self.decide(admission, path))
    }

    /// [`handle`](Self::handle) with an explicit clock reading.
    pub fn handle_at(
        &self,
        client_id: &str,
        path: &str,
        now: Instant,
    ) -> Result<Outcome<'_>, RateLimitError> {
        let admission = self.registry.check_at(client_id, now)?;
        Ok(self.decide(admission, path))
    }

    fn decide(&self, admission: RateLimitResult, path: &str) -> Outcome<'_> {
        if let RateLimitResult::Limited { .. } = admission {
            return Outcome::RateLimited { retry_after: Duration::from_secs(RETRY_AFTER_SECS) };
        }

        match self.routes.route(path) {
            Some(route) => Outcome::Forwarded(route),
            None => Outcome::RouteNotFound,
        }
    }
}
