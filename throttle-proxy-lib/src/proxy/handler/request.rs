use http::{Method, StatusCode};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::net::{IpAddr, SocketAddr};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::proxy::context::ProxyContext;
use crate::proxy::dispatcher::Outcome;
use crate::proxy::forwarding::{forward, ForwardConfig};
use crate::proxy::handler::headers::add_forwarded_headers;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::synthetic_response::{
    error_response, plain_response, rate_limited_response, route_not_found_response, RespBody,
};
use crate::telemetry::metrics::values;
use crate::telemetry::ping_response;

/// Path answered locally (after admission) instead of being proxied.
pub const PING_PATH: &str = "/ping";

/// Per-request information carried from dispatch to the access log
pub struct RequestContext {
    pub client: IpAddr,
    pub client_id: String,
    pub method: Method,
    pub path: String,
    /// Matched route prefix, `none` when the request was not routed
    pub route: String,
}

impl RequestContext {
    pub fn new<B>(req: &Request<B>, peer: SocketAddr) -> Self {
        let client = peer.ip();
        Self {
            client,
            client_id: client.to_string(),
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            route: values::ROUTE_NONE.to_string(),
        }
    }
}

/// Serve one inbound request: admission, routing, forwarding.
///
/// Always produces a response; failures become synthetic 5xx responses.
pub async fn handle_proxy_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    ctx: &ProxyContext,
) -> Response<RespBody> {
    let start = Instant::now();
    let protocol = format!("{:?}", req.version());
    let mut rctx = RequestContext::new(&req, peer);

    let response = match dispatch(req, &mut rctx, ctx).await {
        Ok(resp) => resp,
        Err(e) => {
            if e.is_upstream_failure() {
                warn!(client = %rctx.client_id, path = %rctx.path, route = %rctx.route, error = %e, "upstream request failed");
            } else {
                error!(client = %rctx.client_id, path = %rctx.path, error = %e, "request failed");
            }
            error_response(&e).unwrap_or_else(|_| {
                plain_response(StatusCode::from(&e), "Internal Server Error")
            })
        }
    };

    let status = response.status().as_u16();
    let latency = start.elapsed();
    info!(
        method = %rctx.method,
        path = %rctx.path,
        client = %rctx.client_id,
        status,
        latency_ms = latency.as_secs_f64() * 1000.0,
        "request"
    );
    if let Some(m) = &ctx.metrics {
        m.record_request(
            rctx.method.as_str(),
            status,
            &protocol,
            &rctx.route,
            latency.as_secs_f64(),
        );
    }

    response
}

async fn dispatch(
    mut req: Request<Incoming>,
    rctx: &mut RequestContext,
    ctx: &ProxyContext,
) -> HttpResult<Response<RespBody>> {
    let metrics = ctx.metrics.as_ref();

    if rctx.path == PING_PATH && rctx.method == Method::GET {
        let admission = ctx.dispatcher.admit(&rctx.client_id).map_err(limiter_failure(ctx))?;
        if admission.is_limited() {
            return rate_limited(ctx);
        }
        if let Some(m) = metrics {
            m.record_rate_limit_allowed();
        }
        return ping_response().map_err(downstream);
    }

    let outcome = ctx
        .dispatcher
        .handle(&rctx.client_id, &rctx.path)
        .map_err(limiter_failure(ctx))?;
    if let Some(m) = metrics {
        m.record_tracked_clients(ctx.registry().client_count());
    }

    match outcome {
        Outcome::RateLimited { .. } => rate_limited(ctx),
        Outcome::RouteNotFound => {
            debug!(client = %rctx.client_id, path = %rctx.path, "no route for path");
            if let Some(m) = metrics {
                m.record_rate_limit_allowed();
                m.record_route_not_found();
            }
            route_not_found_response(&rctx.path).map_err(downstream)
        }
        Outcome::Forwarded(route) => {
            if let Some(m) = metrics {
                m.record_rate_limit_allowed();
            }
            rctx.route = route.prefix.to_string();
            add_forwarded_headers(&mut req, rctx.client);
            forward(
                req,
                route,
                ForwardConfig {
                    client_pool: &ctx.client_pool,
                    upstream_timeout: ctx.upstream_timeout,
                    metrics,
                },
            )
            .await
        }
    }
}

fn rate_limited(ctx: &ProxyContext) -> HttpResult<Response<RespBody>> {
    if let Some(m) = &ctx.metrics {
        m.record_rate_limit_rejection();
    }
    rate_limited_response().map_err(downstream)
}

fn limiter_failure(
    ctx: &ProxyContext,
) -> impl FnOnce(crate::security::rate_limit::RateLimitError) -> HttpError + '_ {
    move |e| {
        if let Some(m) = &ctx.metrics {
            m.record_error(values::ERROR_LIMITER_FAILURE);
        }
        HttpError::from(e)
    }
}

fn downstream(e: crate::error::ProxyError) -> HttpError {
    HttpError::FailedToGenerateDownstreamResponse(e.to_string())
}
