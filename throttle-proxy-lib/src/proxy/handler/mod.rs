pub mod headers;
pub mod request;

pub use headers::add_forwarded_headers;
pub use request::{handle_proxy_request, RequestContext};
