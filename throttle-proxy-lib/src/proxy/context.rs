use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::proxy::client_pool::ClientPool;
use crate::proxy::dispatcher::Dispatcher;
use crate::routing::RouteTable;
use crate::security::rate_limit::BucketRegistry;
use crate::telemetry::Metrics;

/// State shared by every request served by one proxy instance
pub struct ProxyContext {
    pub dispatcher: Dispatcher,
    pub client_pool: ClientPool,
    pub upstream_timeout: Duration,
    pub metrics: Option<Arc<Metrics>>,
}

impl ProxyContext {
    pub fn new(
        dispatcher: Dispatcher,
        client_pool: ClientPool,
        upstream_timeout: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { dispatcher, client_pool, upstream_timeout, metrics }
    }

    /// Build the route table, bucket registry and upstream client from a
    /// validated configuration.
    pub fn from_config(config: &Config, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let routes = Arc::new(RouteTable::new(&config.routes)?);
        let registry = Arc::new(BucketRegistry::from_config(&config.rate_limit));
        Ok(Self::new(
            Dispatcher::new(registry, routes),
            ClientPool::new(&config.timeout),
            Duration::from_millis(config.timeout.upstream_ms),
            metrics,
        ))
    }

    pub fn registry(&self) -> &Arc<BucketRegistry> {
        self.dispatcher.registry()
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        self.dispatcher.routes()
    }
}
