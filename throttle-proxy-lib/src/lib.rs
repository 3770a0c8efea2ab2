#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod load_balancing;
pub mod proxy;
pub mod routing;
pub mod security;
pub mod telemetry;

pub use config::{load_from_path, Config, RateLimitConfig, Route};
pub use error::{ProxyError, Result};
pub use load_balancing::RoundRobin;
pub use proxy::{serve, Dispatcher, Outcome, ProxyContext};
pub use routing::{RouteMatch, RouteTable};
pub use security::rate_limit::{BucketRegistry, RateLimitResult, TokenBucket};
