//! Restic Probe Exporter
//!
//! Serves `/probe` and `/metrics` until interrupted.

use clap::Parser;
use restic_exporter::{
    config::{Cli, ExporterConfig},
    metrics::MetricsServer,
    probe::ResticCommand,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match ExporterConfig::load(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Restic exporter v{}", restic_exporter::VERSION);
    info!(
        restic = %config.restic_bin.display(),
        cache_dir = %config.cache_dir.display(),
        timeout = ?config.probe_timeout,
        "Starting exporter on http://{}:{}",
        config.address,
        config.port
    );

    let runner = ResticCommand::new(&config.restic_bin);
    let server = match MetricsServer::new(&config, runner) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to set up server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
