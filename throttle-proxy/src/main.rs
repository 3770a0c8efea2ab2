#![forbid(unsafe_code)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use throttle_proxy_lib::config::load_from_path;
use throttle_proxy_lib::proxy::server::{serve, spawn_signal_listener};
use throttle_proxy_lib::proxy::ProxyContext;
use throttle_proxy_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reverse proxy with per-client token bucket rate limiting")]
struct Cli {
    /// Path to configuration file (TOML, or YAML for .yaml/.yml)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "THROTTLE_PROXY_CONFIG",
        default_value = "config/config.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_from_path(&cli.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(err) => {
            // Tracing is configured from the file, so this one goes to stderr.
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&config.logging, &config.telemetry) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    info!(
        listen = %config.listen,
        routes = config.routes.len(),
        "configuration loaded"
    );

    let (metrics, registry) = match init_metrics() {
        Ok((metrics, registry)) => (Some(metrics), Some(registry)),
        Err(err) => {
            warn!(%err, "metrics disabled, failed to initialize exporter");
            (None, None)
        }
    };

    let ctx = match ProxyContext::from_config(&config, metrics) {
        Ok(ctx) => Arc::new(ctx),
        Err(err) => {
            error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    if let Err(err) = spawn_signal_listener(shutdown.clone()) {
        error!(%err, "failed to install signal handlers");
        std::process::exit(1);
    }

    if let (Some(port), Some(registry)) = (config.telemetry.metrics_port, registry) {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                let routes = ctx.routes().clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        start_observability_server(listener, registry, routes, shutdown).await
                    {
                        error!(%err, "observability server exited with error");
                    }
                });
            }
            Err(err) => warn!(%err, port, "failed to bind observability server"),
        }
    }

    let listener = match TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, listen = %config.listen, "failed to bind listener");
            std::process::exit(1);
        }
    };

    if let Err(err) = serve(listener, config, ctx, shutdown).await {
        error!(%err, "proxy exited with error");
        std::process::exit(1);
    }
}
