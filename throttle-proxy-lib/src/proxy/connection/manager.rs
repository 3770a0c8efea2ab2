use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

use super::guards::ConnectionGuard;

/// Errors that can occur when trying to accept a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Server is shutting down")]
    Shutdown,
    #[error("Connection limit exceeded (current: {current}, limit: {limit})")]
    LimitExceeded { current: usize, limit: usize },
}

/// Manages connection limits and lifecycle
pub struct ConnectionManager {
    active_connections: Arc<AtomicUsize>,
    max_connections: usize,
    shutdown: CancellationToken,
    connections_closed_tx: watch::Sender<()>,
}

impl ConnectionManager {
    pub fn new(security: &SecurityConfig, shutdown: CancellationToken) -> Self {
        let (connections_closed_tx, _) = watch::channel(());
        Self {
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_connections: security.max_connections,
            shutdown,
            connections_closed_tx,
        }
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Try to accept a new connection
    /// Returns Ok(guard) if connection is accepted, Err(ConnectionError) if rejected
    pub fn try_accept(
        &self,
        peer: std::net::SocketAddr,
        metrics: Option<&Arc<Metrics>>,
    ) -> Result<ConnectionGuard, ConnectionError> {
        if self.is_shutdown() {
            if let Some(m) = metrics {
                m.record_connection_rejected(values::REASON_SHUTDOWN);
            }
            return Err(ConnectionError::Shutdown);
        }

        let reserved = self.active_connections.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |current| (current < self.max_connections).then(|| current.saturating_add(1)),
        );
        if let Err(current) = reserved {
            if let Some(m) = metrics {
                m.record_connection_rejected(values::REASON_CONNECTION_LIMIT);
            }
            warn!(
                current,
                limit = self.max_connections,
                peer = %peer,
                "Connection limit exceeded, rejecting connection"
            );
            return Err(ConnectionError::LimitExceeded {
                current,
                limit: self.max_connections,
            });
        }

        if let Some(m) = metrics {
            m.record_connection_accepted();
        }

        Ok(ConnectionGuard::new(
            self.active_connections.clone(),
            self.connections_closed_tx.clone(),
            metrics.cloned(),
        ))
    }

    /// Wait until every accepted connection has finished or `timeout` expires.
    /// Returns the number of connections still open.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut closed_rx = self.connections_closed_tx.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let active = self.active();
            if active == 0 {
                info!("All connections closed");
                return 0;
            }
            info!(active_connections = active, "Waiting for connections to close");
            match tokio::time::timeout_at(deadline, closed_rx.changed()).await {
                Ok(Ok(())) => continue,
                // Sender lives in self, so the channel cannot close while we wait.
                Ok(Err(_)) => return self.active(),
                Err(_) => {
                    let active = self.active();
                    warn!(active_connections = active, "Shutdown timeout reached");
                    return active;
                }
            }
        }
    }
}
