use ahash::AHashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::{RateLimitError, RateLimitResult, TokenBucket};
use crate::config::RateLimitConfig;

/// Concurrent map from client identifier to that client's [`TokenBucket`].
///
/// Buckets are created on first use from the registry's template
/// (`capacity`, `refill_rate`). The map is read-locked on the hot path and
/// write-locked only to insert or remove entries; a bucket's own state is
/// guarded by the bucket, so clients never contend with each other.
pub struct BucketRegistry {
    capacity: u32,
    refill_rate: f64,
    buckets: RwLock<AHashMap<String, Arc<TokenBucket>>>,
}

impl BucketRegistry {
    pub fn new(refill_rate: f64, capacity: u32) -> Self {
        Self { capacity, refill_rate, buckets: RwLock::new(AHashMap::new()) }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.refill_rate(), config.burst)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Shared handle to the bucket of `client_id`, creating it if needed.
    ///
    /// Concurrent first requests of the same client all receive the same
    /// bucket.
    pub fn bucket_for(&self, client_id: &str) -> Result<Arc<TokenBucket>, RateLimitError> {
        {
            let buckets = self
                .buckets
                .read()
                .map_err(|_| RateLimitError::Poisoned("bucket registry"))?;
            if let Some(bucket) = buckets.get(client_id) {
                return Ok(Arc::clone(bucket));
            }
        }

        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| RateLimitError::Poisoned("bucket registry"))?;
        // Another request may have inserted the bucket between the two locks.
        let bucket = buckets
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.capacity, self.refill_rate)));
        Ok(Arc::clone(bucket))
    }

    /// Debit one token from the bucket of `client_id`.
    ///
    /// The debit happens while the map lock is held, so eviction cannot
    /// remove the bucket between lookup and debit.
    pub fn check(&self, client_id: &str) -> Result<RateLimitResult, RateLimitError> {
        self.with_bucket(client_id, TokenBucket::check)
    }

    pub fn check_at(
        &self,
        client_id: &str,
        now: Instant,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.with_bucket(client_id, |bucket| bucket.check_at(now))
    }

    pub fn allow(&self, client_id: &str) -> Result<bool, RateLimitError> {
        Ok(self.check(client_id)?.is_allowed())
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Forget every client. Their next request starts from a full bucket.
    pub fn clear_all(&self) {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Remove buckets untouched for at least `max_idle` that have refilled
    /// to capacity. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(max_idle, Instant::now())
    }

    pub fn evict_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        // A bucket that has not refilled yet still carries debt; dropping it
        // would hand the client a fresh full bucket.
        buckets.retain(|_, bucket| bucket.idle_for(now) < max_idle || !bucket.is_full_at(now));
        before.saturating_sub(buckets.len())
    }

    fn with_bucket<T>(
        &self,
        client_id: &str,
        f: impl FnOnce(&TokenBucket) -> Result<T, RateLimitError>,
    ) -> Result<T, RateLimitError> {
        {
            let buckets = self
                .buckets
                .read()
                .map_err(|_| RateLimitError::Poisoned("bucket registry"))?;
            if let Some(bucket) = buckets.get(client_id) {
                return f(bucket);
            }
        }

        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| RateLimitError::Poisoned("bucket registry"))?;
        let bucket = buckets
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.capacity, self.refill_rate)));
        f(bucket)
    }
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .field("clients", &self.client_count())
            .finish()
    }
}
