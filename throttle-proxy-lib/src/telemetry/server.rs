use crate::proxy::synthetic_response::{plain_response, RespBody};
use crate::routing::RouteTable;
use crate::telemetry::{
    handle_metrics, health_check_response, live_check_response, ready_check_response,
};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Start the observability server that handles metrics and health checks
/// This server runs on a dedicated listener and serves:
/// - `/metrics` - Prometheus metrics
/// - `/health` - Health check endpoint
/// - `/ready` - Readiness check endpoint
/// - `/live` - Liveness check endpoint
///
/// Runs until `shutdown` is cancelled.
pub async fn start_observability_server(
    listener: TcpListener,
    registry: Registry,
    routes: Arc<RouteTable>,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(registry);
    let addr = listener.local_addr()?;

    info!(?addr, "Observability server started (metrics + health checks)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Observability server: shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "Observability server: accept error");
                        continue;
                    }
                };

                let registry = registry.clone();
                let routes = routes.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        let routes = routes.clone();
                        async move {
                            Ok::<_, hyper::Error>(observability_response(req.uri().path(), &registry, &routes))
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "Observability server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("Observability server stopped");
    Ok(())
}

fn observability_response(
    path: &str,
    registry: &Registry,
    routes: &RouteTable,
) -> Response<RespBody> {
    let result = match path {
        "/health" => health_check_response(),
        "/ready" => ready_check_response(routes),
        "/live" => live_check_response(),
        "/metrics" => handle_metrics(registry),
        _ => return plain_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    result.unwrap_or_else(|e| {
        warn!(error = %e, path, "Observability server: failed to build response");
        plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })
}
