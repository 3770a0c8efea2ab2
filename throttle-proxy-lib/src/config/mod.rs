mod loader;
mod rate_limit;
mod root;
mod route;
mod security;
mod telemetry;
mod timeout;
mod validator;

pub use loader::{load_from_path, load_from_str, ConfigFormat};
pub use rate_limit::{RateLimitConfig, DEFAULT_REFILL_RATE};
pub use root::Config;
pub use route::Route;
pub use security::SecurityConfig;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::{KeepAliveConfig, TimeoutConfig};
pub use validator::validate;
