//! Fault drills against a scripted control endpoint and a real child
//! process. The endpoint stands in for the worker's control server; the
//! child is a plain `sleep` so kills and restarts exercise the same
//! process machinery the real worker goes through.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use gauntlet_conductor::{FaultOutcome, FaultTimings, Orchestrator, ProcFile};
use gauntlet_rpc::{ControlHandler, RpcClient, RpcServer};
use gauntlet_supervisor::{SupervisorConfig, WorkerState, WorkerSupervisor};

struct ScriptedWorker {
    busy: bool,
    case_id: Option<&'static str>,
}

impl ControlHandler for ScriptedWorker {
    fn handle(&self, kind: &str, _payload: &Value) -> Result<Option<Value>, String> {
        match kind {
            "PING" => Ok(Some(json!({"pong": true}))),
            "GET_STATUS" => Ok(Some(json!({
                "busy": self.busy,
                "current_case_id": self.case_id,
                "session_connected": true,
            }))),
            other => Err(format!("unknown_type: {other}")),
        }
    }
}

async fn scripted_endpoint(busy: bool, case_id: Option<&'static str>) -> SocketAddr {
    let handler: Arc<dyn ControlHandler> = Arc::new(ScriptedWorker { busy, case_id });
    let server = RpcServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        handler,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// An address nothing listens on.
fn dead_endpoint() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn sleeper_supervisor() -> WorkerSupervisor {
    WorkerSupervisor::new(SupervisorConfig {
        worker_program: "sleep".to_string(),
        worker_args: vec!["30".to_string()],
        restart_settle_ms: 10,
        ..SupervisorConfig::default()
    })
}

fn test_timings() -> FaultTimings {
    FaultTimings {
        preflight_timeout_ms: 200,
        ping_interval_ms: 25,
        recovery_deadline_ms: 400,
        outage_window_ms: 50,
    }
}

fn orchestrator_at(dir: &TempDir, addr: SocketAddr) -> Orchestrator {
    let client = RpcClient::with_timeout(addr, Duration::from_millis(250));
    let procfile = ProcFile::load(dir.path().join("worker_state.json"));
    Orchestrator::new(sleeper_supervisor(), client, procfile, test_timings())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_busy_worker_refuses_every_drill() {
    let dir = tempfile::tempdir().unwrap();
    let addr = scripted_endpoint(true, Some("2.2.1.2")).await;
    let orchestrator = orchestrator_at(&dir, addr);

    for outcome in [
        orchestrator.hard_disconnect("2.2.1.2").await.unwrap(),
        orchestrator.hard_reconnect("2.2.1.3").await.unwrap(),
        orchestrator.hard_cycle("2.2.1.2").await.unwrap(),
    ] {
        match outcome {
            FaultOutcome::Busy { running } => assert_eq!(running.as_deref(), Some("2.2.1.2")),
            other => panic!("expected busy refusal, got {other:?}"),
        }
    }

    // The refusals never touched the process machinery.
    let report = orchestrator.process_report();
    assert_eq!(report.state, WorkerState::Absent);
    assert!(!report.disconnect_mode);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_stamps_the_fault_window() {
    let dir = tempfile::tempdir().unwrap();
    let addr = scripted_endpoint(false, None).await;
    let orchestrator = orchestrator_at(&dir, addr);
    assert!(orchestrator.start_worker(false).unwrap());

    let outcome = orchestrator.hard_disconnect("2.2.1.2").await.unwrap();
    let report = match outcome {
        FaultOutcome::Completed(report) => report,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(report.case_id, "2.2.1.2");
    let initiated = report.initiated_at.unwrap();
    let killed = report.killed_at.unwrap();
    assert!(initiated <= killed);
    assert!(report.recovered_at.is_none());

    let process = orchestrator.process_report();
    assert_eq!(process.state, WorkerState::Killed);
    assert!(process.disconnect_mode);
    assert!(!process.alive);

    // The latch and the cleared pid survived to disk for the next
    // invocation.
    let record = ProcFile::load(dir.path().join("worker_state.json"));
    assert!(record.disconnect_mode());
    assert_eq!(record.pid(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drill_against_a_dead_worker_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, dead_endpoint());

    let outcome = orchestrator.hard_disconnect("2.2.1.2").await.unwrap();
    assert!(matches!(outcome, FaultOutcome::AlreadyDown));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_times_out_with_a_typed_reason() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, dead_endpoint());

    // The sleeper child starts fine but nothing ever answers PING.
    let outcome = orchestrator.hard_reconnect("2.2.1.3").await.unwrap();
    match outcome {
        FaultOutcome::Failed { reason } => assert_eq!(reason, "ping_timeout_after_start"),
        other => panic!("expected typed failure, got {other:?}"),
    }
    assert!(orchestrator.worker_alive());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cycle_round_trips_when_the_endpoint_answers() {
    let dir = tempfile::tempdir().unwrap();
    let addr = scripted_endpoint(false, None).await;
    let orchestrator = orchestrator_at(&dir, addr);
    assert!(orchestrator.start_worker(false).unwrap());

    let outcome = orchestrator.hard_cycle("2.2.1.2").await.unwrap();
    let report = match outcome {
        FaultOutcome::Completed(report) => report,
        other => panic!("expected completion, got {other:?}"),
    };
    assert!(report.initiated_at.unwrap() <= report.killed_at.unwrap());
    assert!(report.killed_at.unwrap() <= report.recovered_at.unwrap());
    assert_eq!(report.window_ms, Some(50));

    let process = orchestrator.process_report();
    assert_eq!(process.state, WorkerState::Running);
    assert!(!process.disconnect_mode);
    assert!(process.alive);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fresh_invocation_kills_by_recorded_pid() {
    let dir = tempfile::tempdir().unwrap();
    let addr = scripted_endpoint(false, None).await;

    // First invocation starts the worker and records the pid.
    let first = orchestrator_at(&dir, addr);
    assert!(first.start_worker(false).unwrap());
    let pid = first.worker_pid().unwrap();

    // A second invocation has no child handle, only the record.
    let second = orchestrator_at(&dir, addr);
    assert_eq!(second.process_report().state, WorkerState::Absent);
    assert!(second.worker_alive());
    assert_eq!(second.worker_pid(), Some(pid));

    second.kill_worker();
    assert_eq!(second.worker_pid(), None);

    // The first invocation's handle observes the death once it reaps.
    for _ in 0..100 {
        if first.process_report().state == WorkerState::Exited {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(first.process_report().state, WorkerState::Exited);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_persisted_latch_suppresses_start_for_a_fresh_conductor() {
    let dir = tempfile::tempdir().unwrap();
    let addr = scripted_endpoint(false, None).await;

    let first = orchestrator_at(&dir, addr);
    assert!(first.start_worker(false).unwrap());
    let disconnected = first.hard_disconnect("2.2.1.2").await.unwrap();
    assert!(matches!(disconnected, FaultOutcome::Completed(_)));

    // A plain start from a fresh conductor must not heal the outage.
    let second = orchestrator_at(&dir, addr);
    assert!(!second.start_worker(false).unwrap());
    assert!(second.process_report().disconnect_mode);

    // The reconnect drill clears the latch and brings the worker back.
    let reconnected = second.hard_reconnect("2.2.1.3").await.unwrap();
    match reconnected {
        FaultOutcome::Completed(report) => assert!(report.recovered_at.is_some()),
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(second.process_report().state, WorkerState::Running);
    assert!(!ProcFile::load(dir.path().join("worker_state.json")).disconnect_mode());
}
