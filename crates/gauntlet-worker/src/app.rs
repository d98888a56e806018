//! Worker process assembly.
//!
//! Wires the simulated gateway, the risk monitor, the session driver and the
//! case registry behind the control server, then runs until a shutdown
//! signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gauntlet_cases::CaseRegistry;
use gauntlet_risk::RiskMonitor;
use gauntlet_rpc::RpcServer;
use gauntlet_session::{spawn_event_pump, SessionDriver, SimGateway};

use crate::config::WorkerConfig;
use crate::controller::{spawn_heartbeat, WorkerController};
use crate::error::WorkerResult;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Worker {
    config: WorkerConfig,
}

impl Worker {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Connect the session, serve the control protocol, and run until
    /// ctrl-c. The accept loop, the event pump and the heartbeat all hang
    /// off one cancellation token.
    pub async fn run(self) -> WorkerResult<()> {
        let shutdown = CancellationToken::new();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Arc::new(SimGateway::new(self.config.session.clone(), events_tx));
        let monitor = Arc::new(RiskMonitor::new(
            self.config.risk.clone(),
            self.config.thresholds,
        ));
        let driver = Arc::new(SessionDriver::new(session, monitor));
        let pump = spawn_event_pump(Arc::clone(&driver), events_rx, shutdown.clone());

        driver.connect()?;

        let controller = Arc::new(WorkerController::new(
            Arc::clone(&driver),
            CaseRegistry::standard(),
            self.config.params.clone(),
            Duration::from_millis(self.config.cases.settle_ms),
            self.config.test_overrides_path.clone(),
        ));

        let handler: Arc<dyn gauntlet_rpc::ControlHandler> = controller.clone();
        let server = RpcServer::bind(self.config.rpc.listen_addr, handler, shutdown.clone()).await?;
        let heartbeat = spawn_heartbeat(Arc::clone(&controller), HEARTBEAT_INTERVAL, shutdown.clone());

        tokio::select! {
            () = server.run() => {
                warn!("control server stopped");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
        }

        shutdown.cancel();
        if let Err(e) = driver.disconnect() {
            warn!(error = %e, "session disconnect failed during shutdown");
        }
        let _ = heartbeat.await;
        let _ = pump.await;
        info!("worker stopped");
        Ok(())
    }
}
