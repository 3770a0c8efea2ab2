use std::sync::Arc;
use tracing::{debug, warn};

use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// Drive a connection future to completion, closing it once
/// `timeout_duration` has elapsed.
pub async fn serve_with_timeout<F, E>(
    serve_fut: F,
    timeout_duration: tokio::time::Duration,
    metrics: Option<&Arc<Metrics>>,
    peer: std::net::SocketAddr,
) where
    F: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout_duration, serve_fut).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(?peer, error = %e, "serve_connection error");
        }
        Err(_) => {
            warn!(?peer, "connection handling timeout");
            if let Some(m) = metrics {
                m.record_timeout(values::TIMEOUT_CONNECTION_HANDLING);
            }
        }
    }
}
