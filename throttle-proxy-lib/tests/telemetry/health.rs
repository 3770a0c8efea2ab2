use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;
use prometheus::Registry;
use serde_json::Value;
use throttle_proxy_lib::config::Route;
use throttle_proxy_lib::proxy::synthetic_response::RespBody;
use throttle_proxy_lib::telemetry::{
    health_check_response, live_check_response, ping_response, ready_check_response,
    start_observability_server,
};
use throttle_proxy_lib::RouteTable;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

async fn json_body(resp: http::Response<RespBody>) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = resp.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn routes() -> Result<RouteTable, Box<dyn std::error::Error + Send + Sync>> {
    Ok(RouteTable::new(&[
        Route::new("/api", "http://localhost:8000"),
        Route::new("/auth", "http://localhost:9000"),
    ])?)
}

#[tokio::test]
async fn test_health_and_live_responses() -> TestResult {
    let resp = health_check_response()?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await?["status"], "healthy");

    let resp = live_check_response()?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await?["status"], "alive");
    Ok(())
}

#[tokio::test]
async fn test_ready_reports_route_count() -> TestResult {
    let resp = ready_check_response(&routes()?)?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["routes"], 2);
    Ok(())
}

#[tokio::test]
async fn test_ping_response() -> TestResult {
    let resp = ping_response()?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await?;
    assert_eq!(body["message"], "pong");
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_observability_server_endpoints() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(start_observability_server(
        listener,
        Registry::new(),
        Arc::new(routes()?),
        shutdown.clone(),
    ));

    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    for (path, expected) in [
        ("/health", reqwest::StatusCode::OK),
        ("/ready", reqwest::StatusCode::OK),
        ("/live", reqwest::StatusCode::OK),
        ("/metrics", reqwest::StatusCode::OK),
        ("/unknown", reqwest::StatusCode::NOT_FOUND),
    ] {
        let resp = client
            .get(format!("http://{addr}{path}"))
            .send()
            .await
            .map_err(|e| format!("Failed to send request to {path}: {e}"))?;
        assert_eq!(resp.status(), expected, "unexpected status for {path}");
    }

    shutdown.cancel();
    server.await??;
    Ok(())
}
