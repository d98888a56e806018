//! Catalogue scenarios run end to end against the simulated gateway.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gauntlet_cases::{CaseContext, CaseRegistry, TestParams};
use gauntlet_risk::{RiskConfig, RiskMonitor, Thresholds};
use gauntlet_session::{spawn_event_pump, SessionDriver, SimConfig, SimGateway};

const SETTLE: Duration = Duration::from_millis(20);

struct Harness {
    driver: Arc<SessionDriver>,
    registry: CaseRegistry,
    shutdown: CancellationToken,
    pump: JoinHandle<()>,
}

impl Harness {
    async fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(SimGateway::new(SimConfig::default(), tx));
        let monitor = Arc::new(RiskMonitor::new(RiskConfig::default(), Thresholds::default()));
        let driver = Arc::new(SessionDriver::new(session, monitor));
        let shutdown = CancellationToken::new();
        let pump = spawn_event_pump(Arc::clone(&driver), rx, shutdown.clone());

        driver.connect().unwrap();
        tokio::time::sleep(SETTLE).await;

        Self {
            driver,
            registry: CaseRegistry::standard(),
            shutdown,
            pump,
        }
    }

    /// Runs one case the way the worker does, on a blocking thread.
    async fn run_case(&self, id: &str) {
        let scenario = self
            .registry
            .get(id)
            .unwrap_or_else(|| panic!("unknown case {id}"));
        let driver = Arc::clone(&self.driver);
        tokio::task::spawn_blocking(move || {
            let ctx = CaseContext::new(driver, TestParams::default(), SETTLE);
            scenario.run(&ctx).unwrap();
        })
        .await
        .unwrap();
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.pump.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_open_position_fills_and_counts() {
    let harness = Harness::start().await;

    harness.run_case("2.1.2.1").await;

    assert!(
        harness.driver.active_orders().is_empty(),
        "marketable open should fill, not rest"
    );
    assert!(harness.driver.rejected_orders().is_empty());
    assert_eq!(harness.driver.monitor().metrics().order_count, 1);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_symbol_never_reaches_the_gateway() {
    let harness = Harness::start().await;

    harness.run_case("2.4.1.1").await;

    let metrics = harness.driver.monitor().metrics();
    assert_eq!(metrics.order_count, 0, "blocked orders are not counted");
    assert_eq!(metrics.rejection_count, 0);
    assert!(harness.driver.rejected_orders().is_empty());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fund_probe_draws_gateway_rejection() {
    let harness = Harness::start().await;

    harness.run_case("2.4.2.1").await;

    let rejected = harness.driver.rejected_orders();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reject_code, Some(31));

    let metrics = harness.driver.monitor().metrics();
    assert_eq!(metrics.order_count, 1, "probe passed the local gates");
    assert_eq!(metrics.rejection_count, 1);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_position_shortfall_rejected_with_code_30() {
    let harness = Harness::start().await;

    harness.run_case("2.4.2.2").await;

    let rejected = harness.driver.rejected_orders();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reject_code, Some(30));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_halt_blocks_probe_and_restores_flow() {
    let harness = Harness::start().await;

    harness.run_case("2.5.1.1").await;

    let monitor = harness.driver.monitor();
    assert!(monitor.is_active(), "case must resume trading on its way out");
    assert_eq!(monitor.metrics().order_count, 0, "halted probe is not counted");
    assert!(harness.driver.rejected_orders().is_empty());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_order_threshold_alert_fires() {
    let harness = Harness::start().await;

    harness.run_case("2.3.1.1").await;

    let metrics = harness.driver.monitor().metrics();
    assert_eq!(metrics.order_count, 6, "limit 5 plus one over");
    assert!(metrics.warned_order);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repeat_cancel_counted_despite_venue_refusal() {
    let harness = Harness::start().await;

    harness.run_case("2.2.3.3").await;

    let metrics = harness.driver.monitor().metrics();
    assert_eq!(metrics.cancel_count, 1, "only the first cancel confirms");
    assert_eq!(
        metrics.repeat_cancel_count, 1,
        "the duplicate request counts even though the venue refused it"
    );

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_catalogue_runs_clean() {
    let harness = Harness::start().await;

    for id in harness.registry.ids() {
        harness.run_case(id).await;
    }

    // The sweep in 2.5.2.2 leaves the book flat and nothing re-engages
    // the emergency stop on the way out.
    assert!(harness.driver.active_orders().is_empty());
    assert!(harness.driver.monitor().is_active());
    assert!(harness.driver.is_connected());

    harness.stop().await;
}
