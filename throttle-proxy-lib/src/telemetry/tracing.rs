use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::config::{LoggingConfig, TelemetryConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured levels when set. The OpenTelemetry SDK
/// logs through its own target so it can be kept quieter than the proxy.
pub fn init_tracing(
    logging: &LoggingConfig,
    telemetry: &TelemetryConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "{},opentelemetry={}",
            logging.level, telemetry.otel_log_level
        ))
    });
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(logging.show_target);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set global tracing subscriber: {e}"))?;

    Ok(())
}
