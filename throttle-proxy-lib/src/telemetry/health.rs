use hyper::Response;
use hyper::StatusCode;
use serde_json::json;

use crate::error::Result;
use crate::proxy::synthetic_response::{json_response, RespBody};
use crate::routing::RouteTable;

/// Health check response - always returns 200 if process is running
pub fn health_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"status": "healthy"}))
}

/// Readiness check - 200 once the route table holds at least one route,
/// 503 otherwise
pub fn ready_check_response(routes: &RouteTable) -> Result<Response<RespBody>> {
    if routes.is_empty() {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({"status": "not_ready", "reason": "no_routes_configured"}),
        )
    } else {
        json_response(StatusCode::OK, &json!({"status": "ready", "routes": routes.len()}))
    }
}

/// Liveness check - always returns 200 if process is running
pub fn live_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"status": "alive"}))
}

/// Answer to `GET /ping` on the proxy listener.
pub fn ping_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"message": "pong", "status": "healthy"}))
}
