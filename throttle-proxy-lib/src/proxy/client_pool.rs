use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::config::TimeoutConfig;

pub type HttpClient = Client<HttpConnector, Incoming>;

/// Shared HTTP/1.1 client for upstream connections
///
/// Idle upstream connections are kept and reused across requests of all
/// clients, so a forwarded request normally skips the TCP handshake.
#[derive(Clone)]
pub struct ClientPool {
    client: HttpClient,
}

impl ClientPool {
    pub fn new(timeout: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeout.connect_ms)));
        // TCP keep-alive probes on pooled connections
        if timeout.keep_alive.enabled {
            connector.set_keepalive(Some(Duration::from_secs(timeout.keep_alive.timeout_secs)));
        } else {
            connector.set_keepalive(None);
        }
        connector.set_nodelay(true);

        let mut builder = Client::builder(TokioExecutor::new());
        if timeout.keep_alive.enabled {
            builder.pool_idle_timeout(Duration::from_secs(timeout.keep_alive.timeout_secs));
        } else {
            builder.pool_max_idle_per_host(0);
        }

        Self { client: builder.build(connector) }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}
