use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{RateLimitError, RateLimitResult};
use crate::config::DEFAULT_REFILL_RATE;

/// A continuously refilling token bucket for a single client.
///
/// All state lives behind one mutex, so admission decisions on a bucket are
/// linearizable. The critical section does arithmetic only.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        // An instant older than the last refill counts as zero elapsed and
        // must not move the clock backwards.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// A `refill_rate` that is not a positive finite number falls back to
    /// [`DEFAULT_REFILL_RATE`].
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self::new_at(capacity, refill_rate, Instant::now())
    }

    pub fn new_at(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        let refill_rate = if refill_rate.is_finite() && refill_rate > 0.0 {
            refill_rate
        } else {
            DEFAULT_REFILL_RATE
        };
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: now }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Spend one token if available.
    pub fn try_admit(&self) -> Result<bool, RateLimitError> {
        Ok(self.check()?.is_allowed())
    }

    pub fn try_admit_at(&self, now: Instant) -> Result<bool, RateLimitError> {
        Ok(self.check_at(now)?.is_allowed())
    }

    /// Spend one token if available and describe the outcome.
    pub fn check(&self) -> Result<RateLimitResult, RateLimitError> {
        let mut state = self.lock()?;
        // Sampled under the lock so concurrent callers observe increasing instants.
        let now = Instant::now();
        Ok(self.admit_locked(&mut state, now))
    }

    pub fn check_at(&self, now: Instant) -> Result<RateLimitResult, RateLimitError> {
        let mut state = self.lock()?;
        Ok(self.admit_locked(&mut state, now))
    }

    /// Current token level after crediting elapsed time, without spending.
    pub fn peek(&self) -> Result<f64, RateLimitError> {
        let mut state = self.lock()?;
        let now = Instant::now();
        state.refill(now, self.capacity, self.refill_rate);
        Ok(state.tokens)
    }

    pub fn peek_at(&self, now: Instant) -> Result<f64, RateLimitError> {
        let mut state = self.lock()?;
        state.refill(now, self.capacity, self.refill_rate);
        Ok(state.tokens)
    }

    /// Refill to capacity and restart the refill clock.
    pub fn reset_to_full(&self) -> Result<(), RateLimitError> {
        let mut state = self.lock()?;
        state.tokens = self.capacity;
        state.last_refill = Instant::now();
        Ok(())
    }

    /// Time since the bucket was last checked, peeked or reset.
    ///
    /// Reads through a poisoned lock: the timestamp is only used to decide
    /// eviction, never admission.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        now.saturating_duration_since(state.last_refill)
    }

    /// Whether the bucket would be back at capacity at `now`. Does not move
    /// the refill clock, so it leaves [`idle_for`](Self::idle_for) intact.
    pub fn is_full_at(&self, now: Instant) -> bool {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens + elapsed * self.refill_rate >= self.capacity
    }

    fn admit_locked(&self, state: &mut BucketState, now: Instant) -> RateLimitResult {
        state.refill(now, self.capacity, self.refill_rate);
        let limit = self.capacity as u32;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            RateLimitResult::Allowed { limit, remaining: state.tokens.floor() as u32 }
        } else {
            let missing = 1.0 - state.tokens;
            RateLimitResult::Limited {
                limit,
                retry_after: Duration::from_secs_f64(missing / self.refill_rate),
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BucketState>, RateLimitError> {
        self.state.lock().map_err(|_| RateLimitError::Poisoned("token bucket"))
    }
}
