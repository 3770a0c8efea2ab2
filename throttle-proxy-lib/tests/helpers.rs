//! Shared helpers for tests that run a proxy against in-process upstreams

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use throttle_proxy_lib::config::{load_from_str, ConfigFormat};
use throttle_proxy_lib::proxy::server::serve;
use throttle_proxy_lib::telemetry::Metrics;
use throttle_proxy_lib::ProxyContext;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Requests whose path contains this segment are answered after a delay
pub const SLOW_SEGMENT: &str = "/slow";
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

/// An upstream that answers every request with a JSON echo of what it saw
pub struct EchoBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl EchoBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for EchoBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start an echo upstream named `name` on an ephemeral port.
///
/// The body is `{"backend", "path", "host", "x_forwarded_for",
/// "x_forwarded_host", "x_forwarded_proto"}`.
pub async fn spawn_echo_backend(name: &'static str) -> Result<EchoBackend, BoxError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let hits = Arc::new(AtomicUsize::new(0));
    let shutdown = CancellationToken::new();

    let counter = Arc::clone(&hits);
    let token = shutdown.clone();
    tokio::spawn(async move {
        loop {
            let stream = tokio::select! {
                _ = token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(_) => break,
                },
            };
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let svc = service_fn(move |req: Request<hyper::body::Incoming>| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        let path = req
                            .uri()
                            .path_and_query()
                            .map(|pq| pq.as_str().to_string())
                            .unwrap_or_default();
                        if path.contains(SLOW_SEGMENT) {
                            tokio::time::sleep(SLOW_DELAY).await;
                        }
                        let header = |name: &str| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string)
                        };
                        let body = json!({
                            "backend": name,
                            "path": path,
                            "host": header("host"),
                            "x_forwarded_for": header("x-forwarded-for"),
                            "x_forwarded_host": header("x-forwarded-host"),
                            "x_forwarded_proto": header("x-forwarded-proto"),
                        });
                        let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
                        resp.headers_mut().insert(
                            hyper::header::CONTENT_TYPE,
                            hyper::header::HeaderValue::from_static("application/json"),
                        );
                        Ok::<_, Infallible>(resp)
                    }
                });
                let _ = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });

    Ok(EchoBackend { addr, hits, shutdown })
}

/// An address nothing listens on
pub async fn unused_addr() -> Result<SocketAddr, BoxError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// A proxy serving on an ephemeral port until dropped
pub struct TestProxy {
    pub addr: SocketAddr,
    pub ctx: Arc<ProxyContext>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<throttle_proxy_lib::Result<()>>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Cancel the accept loop and wait for `serve` to return
    pub async fn stop(mut self) -> Result<(), BoxError> {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.await??;
        }
        Ok(())
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start a proxy from TOML configuration text.
///
/// `listen` in the text is ignored; the proxy binds 127.0.0.1:0. Metrics
/// are recorded against a no-op meter so the metric paths run too.
pub async fn spawn_proxy(config_toml: &str) -> Result<TestProxy, BoxError> {
    let config = Arc::new(load_from_str(config_toml, ConfigFormat::Toml)?);
    let metrics = Arc::new(Metrics::from_meter(opentelemetry::global::meter(
        "throttle-proxy-test",
    )));
    let ctx = Arc::new(ProxyContext::from_config(&config, Some(metrics))?);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(serve(listener, config, Arc::clone(&ctx), shutdown.clone()));

    Ok(TestProxy { addr, ctx, shutdown, task: Some(task) })
}

/// Plain client that never goes through an environment proxy
pub fn http_client() -> Result<reqwest::Client, BoxError> {
    Ok(reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?)
}
