pub mod rate_limit;

pub use rate_limit::{BucketRegistry, RateLimitError, RateLimitResult, TokenBucket};
