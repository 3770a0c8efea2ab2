use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const ERROR_TYPE: &str = "error_type";
    pub const ROUTE: &str = "route";
    pub const PROTOCOL: &str = "protocol";
    pub const STATUS_CODE: &str = "status_code";
    pub const METHOD: &str = "method";
    pub const TARGET: &str = "target";
    pub const TIMEOUT_TYPE: &str = "timeout_type";
    pub const REASON: &str = "reason";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const ERROR_RATE_LIMITED: &str = "rate_limited";
    pub const ERROR_ROUTE_NOT_FOUND: &str = "route_not_found";
    pub const ERROR_LIMITER_FAILURE: &str = "limiter_failure";
    pub const TIMEOUT_UPSTREAM: &str = "upstream";
    pub const TIMEOUT_CONNECTION_HANDLING: &str = "connection_handling";
    pub const REASON_CONNECTION_LIMIT: &str = "connection_limit";
    pub const REASON_SHUTDOWN: &str = "shutdown";
    /// Route label for requests that matched no route.
    pub const ROUTE_NONE: &str = "none";
}

#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,
    pub connections_rejected_total: Counter<u64>,

    pub requests_total: Counter<u64>,
    pub requests_duration_seconds: Histogram<f64>,

    // Rate limiting
    pub rate_limit_requests_total: Counter<u64>,
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,
    pub rate_limit_tracked_clients: Gauge<u64>,
    pub rate_limit_evicted_total: Counter<u64>,

    pub route_not_found_total: Counter<u64>,

    pub backend_requests_total: Counter<u64>,
    pub backend_errors_total: Counter<u64>,
    pub backend_duration_seconds: Histogram<f64>,

    pub errors_total: Counter<u64>,
    pub timeouts_total: Counter<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    /// Build the instrument set on an arbitrary meter.
    ///
    /// Tests use this with the global no-op meter; production goes through
    /// [`init_metrics`].
    pub fn from_meter(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("throttle_connections_total")
                .with_description("Total number of connections accepted")
                .build(),
            connections_active: meter
                .i64_up_down_counter("throttle_connections_active")
                .with_description("Number of active connections")
                .build(),
            connections_rejected_total: meter
                .u64_counter("throttle_connections_rejected_total")
                .with_description("Connections closed right after accept")
                .build(),

            requests_total: meter
                .u64_counter("throttle_requests_total")
                .with_description("Total number of requests processed")
                .build(),
            requests_duration_seconds: meter
                .f64_histogram("throttle_requests_duration_seconds")
                .with_description("Request duration in seconds")
                .build(),

            rate_limit_requests_total: meter
                .u64_counter("throttle_rate_limit_requests_total")
                .with_description("Admission checks performed")
                .build(),
            rate_limit_allowed_total: meter
                .u64_counter("throttle_rate_limit_allowed_total")
                .with_description("Requests admitted by the rate limiter")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("throttle_rate_limit_rejected_total")
                .with_description("Requests rejected with 429")
                .build(),
            rate_limit_tracked_clients: meter
                .u64_gauge("throttle_rate_limit_tracked_clients")
                .with_description("Clients with a token bucket")
                .build(),
            rate_limit_evicted_total: meter
                .u64_counter("throttle_rate_limit_evicted_total")
                .with_description("Idle token buckets removed")
                .build(),

            route_not_found_total: meter
                .u64_counter("throttle_route_not_found_total")
                .with_description("Admitted requests that matched no route")
                .build(),

            backend_requests_total: meter
                .u64_counter("throttle_backend_requests_total")
                .with_description("Requests forwarded to upstream targets")
                .build(),
            backend_errors_total: meter
                .u64_counter("throttle_backend_errors_total")
                .with_description("Upstream transport failures and timeouts")
                .build(),
            backend_duration_seconds: meter
                .f64_histogram("throttle_backend_duration_seconds")
                .with_description("Upstream response time in seconds")
                .build(),

            errors_total: meter
                .u64_counter("throttle_errors_total")
                .with_description("Errors by type")
                .build(),
            timeouts_total: meter
                .u64_counter("throttle_timeouts_total")
                .with_description("Timeouts by type")
                .build(),

            build_info: meter
                .u64_gauge("throttle_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_connection_accepted(&self) {
        self.connections_total.add(1, &[]);
        self.connections_active.add(1, &[]);
    }

    pub fn record_connection_closed(&self) {
        self.connections_active.add(-1, &[]);
    }

    pub fn record_connection_rejected(&self, reason: &str) {
        self.connections_rejected_total
            .add(1, &[KeyValue::new(labels::REASON, reason.to_string())]);
    }

    pub fn record_rate_limit_allowed(&self) {
        self.rate_limit_requests_total.add(1, &[]);
        self.rate_limit_allowed_total.add(1, &[]);
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_requests_total.add(1, &[]);
        self.rate_limit_rejected_total.add(1, &[]);
        self.errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, values::ERROR_RATE_LIMITED)]);
    }

    pub fn record_tracked_clients(&self, count: usize) {
        self.rate_limit_tracked_clients
            .record(u64::try_from(count).unwrap_or(u64::MAX), &[]);
    }

    pub fn record_buckets_evicted(&self, count: usize) {
        if count > 0 {
            self.rate_limit_evicted_total
                .add(u64::try_from(count).unwrap_or(u64::MAX), &[]);
        }
    }

    pub fn record_route_not_found(&self) {
        self.route_not_found_total.add(1, &[]);
        self.errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, values::ERROR_ROUTE_NOT_FOUND)]);
    }

    pub fn record_backend_request(&self, target: &str, status_code: u16, route: &str, duration: f64) {
        let attrs = [
            KeyValue::new(labels::TARGET, target.to_string()),
            KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
            KeyValue::new(labels::ROUTE, route.to_string()),
        ];
        self.backend_requests_total.add(1, &attrs);
        self.backend_duration_seconds.record(duration, &attrs);
    }

    pub fn record_backend_error(&self, target: &str, error_type: &str, route: &str) {
        self.backend_errors_total.add(
            1,
            &[
                KeyValue::new(labels::TARGET, target.to_string()),
                KeyValue::new(labels::ERROR_TYPE, error_type.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_request(
        &self,
        method: &str,
        status_code: u16,
        protocol: &str,
        route: &str,
        duration: f64,
    ) {
        let attrs = [
            KeyValue::new(labels::METHOD, method.to_string()),
            KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
            KeyValue::new(labels::PROTOCOL, protocol.to_string()),
            KeyValue::new(labels::ROUTE, route.to_string()),
        ];
        self.requests_total.add(1, &attrs);
        self.requests_duration_seconds.record(duration, &attrs);
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, error_type.to_string())]);
    }

    pub fn record_timeout(&self, timeout_type: &str) {
        self.timeouts_total
            .add(1, &[KeyValue::new(labels::TIMEOUT_TYPE, timeout_type.to_string())]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("throttle-proxy");
    let metrics = Arc::new(Metrics::from_meter(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
