pub mod client_pool;
pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod forwarding;
pub mod handler;
pub mod http_result;
pub mod server;
pub mod synthetic_response;
pub mod transport;

pub use client_pool::ClientPool;
pub use context::ProxyContext;
pub use dispatcher::{Dispatcher, Outcome, RETRY_AFTER_SECS};
pub use http_result::{HttpError, HttpResult};
pub use server::serve;
