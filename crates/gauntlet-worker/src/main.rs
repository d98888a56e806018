//! Worker process entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Compliance harness worker: owns the gateway session, the risk monitor
/// and the control server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GAUNTLET_WORKER_CONFIG)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    gauntlet_telemetry::init_logging()?;
    info!("starting gauntlet worker v{}", env!("CARGO_PKG_VERSION"));

    let config = gauntlet_worker::WorkerConfig::load(args.config.as_deref())?;
    info!(
        listen = %config.rpc.listen_addr,
        symbol = %config.params.test_symbol,
        settle_ms = config.cases.settle_ms,
        "configuration loaded"
    );

    gauntlet_worker::Worker::new(config).run().await?;
    Ok(())
}
