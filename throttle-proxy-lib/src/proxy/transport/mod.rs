pub mod timeout_helper;

pub use timeout_helper::serve_with_timeout;
