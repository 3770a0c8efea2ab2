use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::telemetry::Metrics;

/// Decrements the active connection counter when the connection task ends
/// and wakes the shutdown waiter when the last connection closes.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
    metrics: Option<Arc<Metrics>>,
}

impl ConnectionGuard {
    pub fn new(
        counter: Arc<AtomicUsize>,
        notifier: watch::Sender<()>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { counter, notifier, metrics }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::AcqRel);
        if let Some(m) = &self.metrics {
            m.record_connection_closed();
        }
        if remaining == 1 {
            self.notifier.send_replace(());
        }
    }
}
