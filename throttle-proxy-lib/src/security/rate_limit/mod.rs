//! Per-client token bucket rate limiting.
//!
//! Every client identifier owns one [`TokenBucket`]. Buckets live in a
//! [`BucketRegistry`] that creates them lazily on first sight of a client and
//! hands out shared `Arc` handles, so concurrent requests of the same client
//! always debit the same bucket.
//!
//! # Algorithm
//!
//! A bucket holds up to `capacity` tokens and refills continuously at
//! `refill_rate` tokens per second. Each admission check first credits
//! `elapsed * refill_rate` tokens (capped at `capacity`), then spends one
//! token if at least one is available. A denied check keeps the credited
//! partial refill.
//!
//! # Example Usage
//!
//! ```ignore
//! use throttle_proxy_lib::security::rate_limit::{BucketRegistry, RateLimitResult};
//!
//! // 10 requests per second, bursts of up to 50
//! let registry = BucketRegistry::new(10.0, 50);
//!
//! match registry.check("192.168.1.1")? {
//!     RateLimitResult::Allowed { remaining, .. } => {
//!         // forward the request
//!     }
//!     RateLimitResult::Limited { .. } => {
//!         // 429 Too Many Requests
//!     }
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [rate_limit]
//! requests_per_second = 10   # or requests_per_minute = 600
//! burst = 50
//! idle_eviction_secs = 600   # optional
//! ```

mod bucket;
mod registry;
mod sweeper;

pub use bucket::TokenBucket;
pub use registry::BucketRegistry;
pub use sweeper::spawn_idle_sweeper;

use std::time::Duration;
use thiserror::Error;

/// Failures of the rate limiter itself, as opposed to a request being limited.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// A thread panicked while holding a rate limiter lock. The protected
    /// state can no longer be trusted, so no admission decision is made.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitResult {
    /// Request is allowed to proceed.
    Allowed {
        /// Bucket capacity
        limit: u32,
        /// Whole tokens left after this request
        remaining: u32,
    },
    /// Request is rate limited and should be rejected.
    Limited {
        /// Bucket capacity
        limit: u32,
        /// Time until the bucket holds a whole token again
        retry_after: Duration,
    },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Returns true if the request is limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateLimitResult::Allowed { limit, .. } | RateLimitResult::Limited { limit, .. } => {
                *limit
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitResult::Allowed { remaining, .. } => *remaining,
            RateLimitResult::Limited { .. } => 0,
        }
    }

    /// Get the retry delay if limited.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { retry_after, .. } => Some(*retry_after),
            RateLimitResult::Allowed { .. } => None,
        }
    }
}
