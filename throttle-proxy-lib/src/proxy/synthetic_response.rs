use http::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use bytes::Bytes;
use hyper::Response;
use serde::Serialize;
use serde_json::json;

use crate::error::{ProxyError, Result};
use crate::proxy::dispatcher::RETRY_AFTER_SECS;
use crate::proxy::http_result::HttpError;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

pub fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<RespBody>> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| ProxyError::Http(format!("Failed to serialize response body: {e}")))?;
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(bytes))
        .map_err(|e| ProxyError::Http(format!("Failed to build response: {e}")))
}

/// Plain text response that cannot fail to build
pub fn plain_response(status: StatusCode, text: &'static str) -> Response<RespBody> {
    let mut resp = Response::new(full_body(text));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

/// 429 with a fixed `Retry-After`
pub fn rate_limited_response() -> Result<Response<RespBody>> {
    let mut resp = json_response(
        StatusCode::TOO_MANY_REQUESTS,
        &json!({
            "error": "rate limit exceeded",
            "message": "too many requests, please try again later",
        }),
    )?;
    resp.headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    Ok(resp)
}

/// 404 naming the path no route matched
pub fn route_not_found_response(path: &str) -> Result<Response<RespBody>> {
    json_response(
        StatusCode::NOT_FOUND,
        &json!({"error": "no route found for path", "path": path}),
    )
}

/// Build the response for a failed request: 502 for upstream failures,
/// 500 for everything else
pub fn error_response(error: &HttpError) -> Result<Response<RespBody>> {
    let status = StatusCode::from(error);
    let body = if error.is_upstream_failure() {
        json!({"error": "bad gateway", "message": error.to_string()})
    } else {
        json!({"error": "internal server error", "message": error.to_string()})
    };
    json_response(status, &body)
}
