//! SMS log receiver - stores uploaded SMS log CSV files by UTC date

use clap::Parser;
use smslog_receiver::config::{Config, ConfigLoader};
use smslog_receiver::metrics::server::MetricsServer;
use smslog_receiver::{logging, server::Server};
use std::path::PathBuf;
use tracing::info;

const DEFAULT_CONFIG: &str = "config.yaml";

/// SMS log receiver - multipart upload endpoint for the SMS recorder
#[derive(Parser, Debug)]
#[command(name = "smslog-receiver")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when ./config.yaml is absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config: Config = match &args.config {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::load_or_default(DEFAULT_CONFIG)?,
    };

    logging::init_subscriber(config.logging.format, &args.log_level.to_lowercase())?;

    info!("Starting smslog-receiver v{}", smslog_receiver::VERSION);
    match &args.config {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("Using configuration from {} or defaults", DEFAULT_CONFIG),
    }

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(config.metrics_address());
        let addr = server.start().await?;
        info!("Metrics available at http://{}/metrics", addr);
        Some(server)
    } else {
        None
    };

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(metrics_server) = metrics_server.as_mut() {
        metrics_server.shutdown().await;
    }

    Ok(())
}
