use http::header::HOST;
use http::Version;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::proxy::client_pool::ClientPool;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::synthetic_response::RespBody;
use crate::routing::RouteMatch;
use crate::telemetry::Metrics;

/// Forwarding configuration parameters
pub struct ForwardConfig<'a> {
    pub client_pool: &'a ClientPool,
    pub upstream_timeout: Duration,
    pub metrics: Option<&'a Arc<Metrics>>,
}

/// Relay `req` to the target chosen for it and return the upstream response
/// unchanged.
///
/// The full original path and query are appended to the target base. The
/// inbound `Host` is replaced by the target authority; callers that want the
/// original host upstream add it as `X-Forwarded-Host` first. Failures are
/// never retried.
pub async fn forward(
    req: Request<Incoming>,
    route: RouteMatch<'_>,
    config: ForwardConfig<'_>,
) -> HttpResult<Response<RespBody>> {
    let start = Instant::now();
    let target = route.target;

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = target
        .upstream_uri(path_and_query)
        .map_err(|e| HttpError::FailedToGenerateUpstreamRequest(e.to_string()))?;

    let (mut parts, body) = req.into_parts();
    parts.uri = uri;
    // The pooled client speaks HTTP/1.1 regardless of the inbound protocol.
    parts.version = Version::HTTP_11;
    parts.headers.remove(HOST);
    let out_req = Request::from_parts(parts, body);

    debug!(target_url = %out_req.uri(), route = route.prefix, "forwarding request");

    let result = tokio::time::timeout(
        config.upstream_timeout,
        config.client_pool.client().request(out_req),
    )
    .await;

    let duration = start.elapsed().as_secs_f64();

    let error = match result {
        Ok(Ok(resp)) => {
            if let Some(m) = config.metrics {
                m.record_backend_request(
                    target.as_str(),
                    resp.status().as_u16(),
                    route.prefix,
                    duration,
                );
            }
            return Ok(resp.map(|b| b.boxed()));
        }
        Ok(Err(e)) => HttpError::FailedToGetResponseFromBackend(e.to_string()),
        Err(_) => HttpError::UpstreamTimeout(config.upstream_timeout),
    };

    if let Some(m) = config.metrics {
        m.record_backend_error(target.as_str(), error.error_type(), route.prefix);
        if matches!(error, HttpError::UpstreamTimeout(_)) {
            m.record_timeout(crate::telemetry::metrics::values::TIMEOUT_UPSTREAM);
        }
    }
    Err(error)
}
