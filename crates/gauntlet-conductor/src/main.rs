//! Conductor entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use gauntlet_conductor::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    gauntlet_telemetry::init_logging()?;
    info!("starting gauntlet conductor v{}", env!("CARGO_PKG_VERSION"));

    let config = gauntlet_conductor::ConductorConfig::load(cli.config.as_deref())?;
    info!(
        worker_addr = %config.rpc.worker_addr,
        worker_program = %config.supervisor.worker_program,
        "configuration loaded"
    );

    cli::run(cli.command, config).await
}
