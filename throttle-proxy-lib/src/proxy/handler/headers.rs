use http::header::{HeaderName, HeaderValue, HOST};
use hyper::Request;
use std::net::IpAddr;

pub mod forwarded {
    pub const FOR: &str = "x-forwarded-for";
    pub const HOST: &str = "x-forwarded-host";
    pub const PROTO: &str = "x-forwarded-proto";
}

/// Add X-Forwarded-* headers to the request
///
/// 1. Appends the client IP to X-Forwarded-For (or creates it if missing)
/// 2. Sets X-Forwarded-Host from the request's Host header
/// 3. Sets X-Forwarded-Proto to "http"
pub fn add_forwarded_headers<B>(req: &mut Request<B>, client_ip: IpAddr) {
    let client_ip = client_ip.to_string();
    let xff = match req.headers().get(forwarded::FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&xff) {
        req.headers_mut()
            .insert(HeaderName::from_static(forwarded::FOR), value);
    }

    if let Some(host) = req.headers().get(HOST).cloned() {
        req.headers_mut()
            .insert(HeaderName::from_static(forwarded::HOST), host);
    }

    req.headers_mut().insert(
        HeaderName::from_static(forwarded::PROTO),
        HeaderValue::from_static("http"),
    );
}
