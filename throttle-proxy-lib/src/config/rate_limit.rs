use serde::Deserialize;

/// Refill rate used when neither `requests_per_second` nor
/// `requests_per_minute` is a positive number.
pub const DEFAULT_REFILL_RATE: f64 = 1.0;

/// Per-client rate limiting configuration
///
/// Every client (identified by its source IP) gets its own token bucket.
/// A bucket starts full with `burst` tokens, refills continuously at the
/// derived rate and never holds more than `burst` tokens.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained rate in requests per second
    /// Takes precedence over `requests_per_minute` when positive
    #[serde(default)]
    pub requests_per_second: Option<f64>,
    /// Sustained rate in requests per minute
    /// Used only when `requests_per_second` is absent or not positive
    #[serde(default)]
    pub requests_per_minute: Option<f64>,
    /// Bucket capacity (maximum burst size)
    /// Must be greater than 0
    pub burst: u32,
    /// Evict buckets of clients idle for this many seconds (optional)
    /// Default: None (buckets are kept for the lifetime of the process)
    #[serde(default)]
    pub idle_eviction_secs: Option<u64>,
}

impl RateLimitConfig {
    pub fn per_second(requests_per_second: f64, burst: u32) -> Self {
        Self {
            requests_per_second: Some(requests_per_second),
            requests_per_minute: None,
            burst,
            idle_eviction_secs: None,
        }
    }

    pub fn per_minute(requests_per_minute: f64, burst: u32) -> Self {
        Self {
            requests_per_second: None,
            requests_per_minute: Some(requests_per_minute),
            burst,
            idle_eviction_secs: None,
        }
    }

    /// Token refill rate in tokens per second.
    ///
    /// A positive `requests_per_second` wins, otherwise a positive
    /// `requests_per_minute` is divided by 60, otherwise
    /// [`DEFAULT_REFILL_RATE`]. Never returns zero.
    pub fn refill_rate(&self) -> f64 {
        match (self.requests_per_second, self.requests_per_minute) {
            (Some(rps), _) if is_positive(rps) => rps,
            (_, Some(rpm)) if is_positive(rpm) => rpm / 60.0,
            _ => DEFAULT_REFILL_RATE,
        }
    }

    /// Whether an explicit positive rate was configured.
    pub fn has_explicit_rate(&self) -> bool {
        self.requests_per_second.is_some_and(is_positive)
            || self.requests_per_minute.is_some_and(is_positive)
    }
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
