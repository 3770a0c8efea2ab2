use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::proxy::connection::ConnectionManager;
use crate::proxy::context::ProxyContext;
use crate::proxy::handler::handle_proxy_request;
use crate::proxy::transport::serve_with_timeout;
use crate::security::rate_limit::spawn_idle_sweeper;

/// Cancel `shutdown` on the first SIGTERM or SIGINT.
pub fn spawn_signal_listener(shutdown: CancellationToken) -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        ProxyError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
    })?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
        ProxyError::Io(std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))
    })?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    });
    Ok(())
}

/// Accept connections on `listener` until `shutdown` is cancelled, then wait
/// up to `timeout.shutdown_secs` for open connections to finish.
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    ctx: Arc<ProxyContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr().map_err(ProxyError::Io)?;
    let connections = ConnectionManager::new(&config.security, shutdown.clone());
    let connection_timeout = Duration::from_secs(config.timeout.connection_handling_secs);

    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder.http1().keep_alive(config.timeout.keep_alive.enabled);

    let sweeper = config.rate_limit.idle_eviction_secs.map(|secs| {
        info!(idle_eviction_secs = secs, "idle bucket eviction enabled");
        spawn_idle_sweeper(
            ctx.registry().clone(),
            Duration::from_secs(secs),
            ctx.metrics.clone(),
            shutdown.child_token(),
        )
    });

    info!(
        ?addr,
        routes = ctx.routes().len(),
        refill_rate = ctx.registry().refill_rate(),
        burst = ctx.registry().capacity(),
        "rate limiting proxy listening"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                let guard = match connections.try_accept(peer, ctx.metrics.as_ref()) {
                    Ok(guard) => guard,
                    Err(e) => {
                        debug!(?peer, error = %e, "connection rejected");
                        continue;
                    }
                };

                let builder = builder.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let metrics = ctx.metrics.clone();
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let ctx = ctx.clone();
                        async move { Ok::<_, hyper::Error>(handle_proxy_request(req, peer, &ctx).await) }
                    });
                    serve_with_timeout(
                        builder.serve_connection(TokioIo::new(stream), svc),
                        connection_timeout,
                        metrics.as_ref(),
                        peer,
                    )
                    .await;
                });
            }
        }
    }

    info!(
        "Waiting for active connections to finish (timeout: {}s)",
        config.timeout.shutdown_secs
    );
    drop(listener);
    connections
        .drain(Duration::from_secs(config.timeout.shutdown_secs))
        .await;
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    info!("Proxy server stopped");
    Ok(())
}
