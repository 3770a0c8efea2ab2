use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use throttle_proxy_lib::security::rate_limit::{RateLimitResult, TokenBucket};

#[test]
fn test_new_bucket_is_full() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Instant::now();
    let bucket = TokenBucket::new_at(5, 2.0, now);
    assert_eq!(bucket.capacity(), 5.0);
    assert_eq!(bucket.refill_rate(), 2.0);
    assert_eq!(bucket.peek_at(now)?, 5.0);
    Ok(())
}

#[test]
fn test_burst_admission() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Instant::now();
    let bucket = TokenBucket::new_at(5, 10.0, now);

    for i in 0..5 {
        assert!(bucket.try_admit_at(now)?, "request {i} should be admitted");
    }
    assert!(!bucket.try_admit_at(now)?, "6th request should be denied");
    Ok(())
}

#[test]
fn test_refill_over_time() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 5 tokens/second: 200ms refills exactly one token
    let start = Instant::now();
    let bucket = TokenBucket::new_at(5, 5.0, start);
    for _ in 0..5 {
        bucket.try_admit_at(start)?;
    }
    assert!(!bucket.try_admit_at(start)?);

    let later = start + Duration::from_millis(400);
    assert!(bucket.try_admit_at(later)?);
    assert!(bucket.try_admit_at(later)?);
    assert!(!bucket.try_admit_at(later)?);
    Ok(())
}

#[test]
fn test_refill_is_linear() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // After exhaustion, waiting t admits floor(rate * t) more requests
    let start = Instant::now();
    let bucket = TokenBucket::new_at(100, 10.0, start);
    for _ in 0..100 {
        bucket.try_admit_at(start)?;
    }

    let later = start + Duration::from_millis(1_750);
    let mut admitted = 0;
    while bucket.try_admit_at(later)? {
        admitted += 1;
    }
    assert_eq!(admitted, 17);
    Ok(())
}

#[test]
fn test_denial_keeps_partial_refill() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    let bucket = TokenBucket::new_at(1, 1.0, start);
    assert!(bucket.try_admit_at(start)?);

    // Half a token: denied, but the half is kept
    let half = start + Duration::from_millis(500);
    assert!(!bucket.try_admit_at(half)?);
    let level = bucket.peek_at(half)?;
    assert!((level - 0.5).abs() < 1e-9, "level was {level}");

    // Another half completes the token
    let full = start + Duration::from_millis(1_000);
    assert!(bucket.try_admit_at(full)?);
    Ok(())
}

#[test]
fn test_capacity_ceiling() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    let bucket = TokenBucket::new_at(5, 100.0, start);
    bucket.try_admit_at(start)?;

    let much_later = start + Duration::from_secs(3_600);
    assert_eq!(bucket.peek_at(much_later)?, 5.0);

    for _ in 0..5 {
        assert!(bucket.try_admit_at(much_later)?);
    }
    assert!(!bucket.try_admit_at(much_later)?);
    Ok(())
}

#[test]
fn test_peek_does_not_consume() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Instant::now();
    let bucket = TokenBucket::new_at(3, 1.0, now);
    assert_eq!(bucket.peek_at(now)?, 3.0);
    assert_eq!(bucket.peek_at(now)?, 3.0);
    assert!(bucket.try_admit_at(now)?);
    assert_eq!(bucket.peek_at(now)?, 2.0);
    Ok(())
}

#[test]
fn test_reset_to_full() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bucket = TokenBucket::new(5, 0.001);
    for _ in 0..5 {
        bucket.try_admit()?;
    }
    assert!(!bucket.try_admit()?);

    bucket.reset_to_full()?;
    assert!(bucket.peek()? >= 5.0);
    for _ in 0..5 {
        assert!(bucket.try_admit()?);
    }
    Ok(())
}

#[test]
fn test_older_instant_counts_as_zero_elapsed() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    let bucket = TokenBucket::new_at(1, 1.0, start + Duration::from_secs(10));
    assert!(bucket.try_admit_at(start + Duration::from_secs(10))?);

    // An instant before the last refill credits nothing and does not move
    // the clock backwards.
    assert!(!bucket.try_admit_at(start)?);
    assert!(!bucket.try_admit_at(start + Duration::from_millis(10_500))?);
    assert!(bucket.try_admit_at(start + Duration::from_secs(11))?);
    Ok(())
}

#[test]
fn test_invalid_rate_falls_back_to_one_per_second() {
    assert_eq!(TokenBucket::new(1, 0.0).refill_rate(), 1.0);
    assert_eq!(TokenBucket::new(1, -3.0).refill_rate(), 1.0);
    assert_eq!(TokenBucket::new(1, f64::NAN).refill_rate(), 1.0);
}

#[test]
fn test_check_reports_remaining_and_retry_after(
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Instant::now();
    let bucket = TokenBucket::new_at(2, 4.0, now);

    assert_eq!(bucket.check_at(now)?, RateLimitResult::Allowed { limit: 2, remaining: 1 });
    assert_eq!(bucket.check_at(now)?, RateLimitResult::Allowed { limit: 2, remaining: 0 });

    let limited = bucket.check_at(now)?;
    assert!(limited.is_limited());
    assert_eq!(limited.limit(), 2);
    assert_eq!(limited.remaining(), 0);
    // One token at 4 tokens/second
    assert_eq!(limited.retry_after(), Some(Duration::from_millis(250)));
    Ok(())
}

#[test]
fn test_idle_for() {
    let start = Instant::now();
    let bucket = TokenBucket::new_at(1, 1.0, start);
    assert_eq!(bucket.idle_for(start + Duration::from_secs(7)), Duration::from_secs(7));
    assert_eq!(bucket.idle_for(start), Duration::ZERO);
}

#[test]
fn test_concurrent_admission_never_exceeds_budget() {
    let capacity = 50;
    let rate = 20.0;
    let start = Instant::now();
    let bucket = Arc::new(TokenBucket::new(capacity, rate));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bucket = Arc::clone(&bucket);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                for _ in 0..500 {
                    match bucket.try_admit() {
                        Ok(true) => {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {}
                        Err(e) => panic!("bucket failed: {e}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .unwrap_or_else(|_| panic!("worker thread panicked"));
    }

    let elapsed = start.elapsed().as_secs_f64();
    let budget = capacity as usize + (rate * elapsed).floor() as usize;
    let admitted = admitted.load(Ordering::Relaxed);
    assert!(admitted >= capacity as usize, "at least the burst is admitted");
    assert!(admitted <= budget, "admitted {admitted} > budget {budget}");

    let level = bucket.peek().unwrap_or_else(|e| panic!("peek failed: {e}"));
    assert!(level >= 0.0 && level <= f64::from(capacity));
}
