use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use circuit_breaker::config::loader;
use circuit_breaker::lifecycle::{signals, Shutdown};
use circuit_breaker::observability::{logging, metrics};
use circuit_breaker::HttpServer;

#[derive(Parser)]
#[command(name = "circuit-breaker")]
#[command(about = "Demo service guarded by per-dependency circuit breakers", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = loader::load(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        failure_rate_threshold = config.circuit_breaker.failure_rate_threshold,
        sliding_window_size = config.circuit_breaker.sliding_window_size,
        wait_duration_ms = u64::try_from(config.circuit_breaker.wait_duration_in_open_state.as_millis())
            .unwrap_or(u64::MAX),
        "Configuration loaded"
    );
    tracing::debug!(?config, "Effective configuration resolved");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(&config)?;
    let registry = server.registry().clone();

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.signalled()).await?;

    for entry in registry.statuses() {
        tracing::info!(breaker = %entry.id, "{}", entry.status);
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
