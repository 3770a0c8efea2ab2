use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::BucketRegistry;
use crate::telemetry::Metrics;

/// Periodically drop buckets of clients idle for at least `max_idle`.
///
/// Sweeps every `max_idle / 2` (at least once per second) until `shutdown`
/// is cancelled.
pub fn spawn_idle_sweeper(
    registry: Arc<BucketRegistry>,
    max_idle: Duration,
    metrics: Option<Arc<Metrics>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let period = (max_idle / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = registry.evict_idle(max_idle);
                    let remaining = registry.client_count();
                    if evicted > 0 {
                        debug!(evicted, remaining, "evicted idle rate limit buckets");
                    }
                    if let Some(m) = &metrics {
                        m.record_buckets_evicted(evicted);
                        m.record_tracked_clients(remaining);
                    }
                }
            }
        }
    })
}
