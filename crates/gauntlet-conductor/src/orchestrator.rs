//! Fault-injection sequences for the disconnect drills.
//!
//! The drill cases need the worker process to actually die and come back
//! while the rest of the harness watches. The orchestrator owns that
//! choreography: it checks the worker is idle, stamps the fault window,
//! and drives the supervisor, the process record and the control channel
//! in the right order. Busy and already-down are reported as outcomes a
//! caller can retry; only transport and spawn failures are errors.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use gauntlet_rpc::RpcClient;
use gauntlet_supervisor::{WorkerState, WorkerSupervisor};

use crate::config::FaultTimings;
use crate::error::ConductorResult;
use crate::procfile::{self, ProcFile};

/// Timestamps collected while a drill runs. `window_ms` is only set by the
/// combined kill-wait-restart drill.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FaultReport {
    pub case_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
}

/// How a drill ended. `Busy` and `AlreadyDown` are refusals the caller may
/// retry later; `Failed` carries a reason string such as
/// `ping_timeout_after_start` so callers can tell "worker never came up"
/// from "worker was busy".
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FaultOutcome {
    Completed(FaultReport),
    Busy {
        #[serde(skip_serializing_if = "Option::is_none")]
        running: Option<String>,
    },
    AlreadyDown,
    Failed {
        reason: String,
    },
}

/// Supervisor-side process view for the status command. `state` reflects
/// this invocation's child handle; `alive` also covers a worker inherited
/// from an earlier invocation via the process record.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub state: WorkerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub alive: bool,
    pub disconnect_mode: bool,
}

enum StatusProbe {
    Busy(Option<String>),
    Idle,
    Unreachable,
}

pub struct Orchestrator {
    supervisor: WorkerSupervisor,
    client: RpcClient,
    procfile: ProcFile,
    timings: FaultTimings,
}

impl Orchestrator {
    /// Composes the drill machinery. The persisted disconnect-mode latch is
    /// replayed into the supervisor so a start decision made two
    /// invocations after the disconnect still honors it.
    #[must_use]
    pub fn new(
        supervisor: WorkerSupervisor,
        client: RpcClient,
        procfile: ProcFile,
        timings: FaultTimings,
    ) -> Self {
        if procfile.disconnect_mode() {
            supervisor.enter_disconnect_mode();
        }
        Self {
            supervisor,
            client,
            procfile,
            timings,
        }
    }

    #[must_use]
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// True when a worker process exists, whether spawned by this
    /// invocation or recorded by an earlier one.
    #[must_use]
    pub fn worker_alive(&self) -> bool {
        self.supervisor.is_running() || self.procfile.pid_alive()
    }

    #[must_use]
    pub fn worker_pid(&self) -> Option<u32> {
        self.supervisor.pid().or_else(|| self.procfile.pid())
    }

    #[must_use]
    pub fn process_report(&self) -> ProcessReport {
        ProcessReport {
            state: self.supervisor.state(),
            pid: self.worker_pid(),
            alive: self.worker_alive(),
            disconnect_mode: self.supervisor.disconnect_mode(),
        }
    }

    /// Starts the worker and records its pid. Returns `Ok(false)` when the
    /// disconnect-mode latch suppressed the start.
    pub fn start_worker(&self, force: bool) -> ConductorResult<bool> {
        if !self.supervisor.is_running() && self.procfile.pid_alive() {
            info!(pid = ?self.procfile.pid(), "worker already running from an earlier invocation");
            return Ok(true);
        }
        let started = self.supervisor.start(force)?;
        if started {
            if let Some(pid) = self.supervisor.pid() {
                self.procfile.record_started(pid);
            }
        }
        Ok(started)
    }

    /// Kills the worker through the live handle when this invocation owns
    /// one, otherwise by recorded pid. Tolerant of an already-dead worker.
    pub fn kill_worker(&self) {
        if self.supervisor.is_running() {
            self.supervisor.kill();
        } else if let Some(pid) = self.procfile.pid() {
            procfile::terminate(pid);
        } else {
            info!("no worker process on record");
        }
        self.procfile.record_stopped();
    }

    /// Clears disconnect mode, kills, waits out the settle interval and
    /// force-starts a fresh worker.
    pub async fn restart_worker(&self) -> ConductorResult<bool> {
        self.supervisor.exit_disconnect_mode();
        self.procfile.set_disconnect_mode(false);
        self.kill_worker();
        let settle = Duration::from_millis(self.supervisor.config().restart_settle_ms);
        tokio::time::sleep(settle).await;
        self.start_worker(true)
    }

    /// Kills the worker and leaves it down. The disconnect-mode latch stays
    /// set so nothing heals the outage until the reconnect drill runs.
    pub async fn hard_disconnect(&self, case_id: &str) -> ConductorResult<FaultOutcome> {
        if let Some(refusal) = self.preflight(case_id).await {
            return Ok(refusal);
        }
        let initiated_at = Utc::now();
        self.supervisor.enter_disconnect_mode();
        self.procfile.set_disconnect_mode(true);
        self.kill_worker();
        let killed_at = Utc::now();
        info!(case_id, "worker down, disconnect mode holds until reconnect");
        Ok(FaultOutcome::Completed(FaultReport {
            case_id: case_id.to_string(),
            initiated_at: Some(initiated_at),
            killed_at: Some(killed_at),
            ..FaultReport::default()
        }))
    }

    /// Brings a downed worker back and waits for it to answer PING.
    pub async fn hard_reconnect(&self, case_id: &str) -> ConductorResult<FaultOutcome> {
        if let StatusProbe::Busy(running) = self.probe_status().await {
            info!(case_id, ?running, "worker busy, drill refused");
            return Ok(FaultOutcome::Busy { running });
        }
        self.supervisor.exit_disconnect_mode();
        self.procfile.set_disconnect_mode(false);
        if !self.start_worker(false)? {
            return Ok(FaultOutcome::Failed {
                reason: "start suppressed by disconnect mode".to_string(),
            });
        }
        match self.ping_within(self.timings.recovery_deadline()).await {
            Some(recovered_at) => {
                info!(case_id, "worker back online");
                Ok(FaultOutcome::Completed(FaultReport {
                    case_id: case_id.to_string(),
                    recovered_at: Some(recovered_at),
                    ..FaultReport::default()
                }))
            }
            None => {
                warn!(
                    case_id,
                    deadline_ms = self.timings.recovery_deadline_ms,
                    "worker never answered after start"
                );
                Ok(FaultOutcome::Failed {
                    reason: "ping_timeout_after_start".to_string(),
                })
            }
        }
    }

    /// Kill, hold a fixed outage window, restart and wait for recovery,
    /// all in one call.
    pub async fn hard_cycle(&self, case_id: &str) -> ConductorResult<FaultOutcome> {
        if let Some(refusal) = self.preflight(case_id).await {
            return Ok(refusal);
        }
        let initiated_at = Utc::now();
        self.supervisor.enter_disconnect_mode();
        self.procfile.set_disconnect_mode(true);
        self.kill_worker();
        let killed_at = Utc::now();

        info!(
            case_id,
            window_ms = self.timings.outage_window_ms,
            "holding the outage window"
        );
        tokio::time::sleep(self.timings.outage_window()).await;

        self.supervisor.exit_disconnect_mode();
        self.procfile.set_disconnect_mode(false);
        self.start_worker(true)?;

        match self.ping_within(self.timings.recovery_deadline()).await {
            Some(recovered_at) => Ok(FaultOutcome::Completed(FaultReport {
                case_id: case_id.to_string(),
                initiated_at: Some(initiated_at),
                killed_at: Some(killed_at),
                recovered_at: Some(recovered_at),
                window_ms: Some(self.timings.outage_window_ms),
            })),
            None => {
                warn!(
                    case_id,
                    deadline_ms = self.timings.recovery_deadline_ms,
                    "worker never answered after restart"
                );
                Ok(FaultOutcome::Failed {
                    reason: "ping_timeout_after_start".to_string(),
                })
            }
        }
    }

    /// Gate shared by the destructive drills: refuse while a case runs,
    /// verify reachability, and fail fast when there is nothing to kill.
    async fn preflight(&self, case_id: &str) -> Option<FaultOutcome> {
        match self.probe_status().await {
            StatusProbe::Busy(running) => {
                info!(case_id, ?running, "worker busy, drill refused");
                Some(FaultOutcome::Busy { running })
            }
            StatusProbe::Idle => None,
            StatusProbe::Unreachable => {
                if self
                    .ping_within(self.timings.preflight_timeout())
                    .await
                    .is_some()
                {
                    return None;
                }
                if self.worker_alive() {
                    warn!(case_id, "worker process alive but not answering");
                    Some(FaultOutcome::Failed {
                        reason: "worker unreachable".to_string(),
                    })
                } else {
                    info!(case_id, "worker already down");
                    Some(FaultOutcome::AlreadyDown)
                }
            }
        }
    }

    async fn probe_status(&self) -> StatusProbe {
        let response = match self.client.request("GET_STATUS", json!({})).await {
            Ok(response) if response.ok => response,
            _ => return StatusProbe::Unreachable,
        };
        let data = response.data.unwrap_or(Value::Null);
        if data.get("busy").and_then(Value::as_bool).unwrap_or(false) {
            let running = data
                .get("current_case_id")
                .and_then(Value::as_str)
                .map(str::to_string);
            StatusProbe::Busy(running)
        } else {
            StatusProbe::Idle
        }
    }

    /// Bounded PING poll. Returns the timestamp of the first answer, or
    /// `None` once the budget is spent.
    async fn ping_within(&self, budget: Duration) -> Option<DateTime<Utc>> {
        let started = tokio::time::Instant::now();
        loop {
            if matches!(self.client.ping().await, Ok(true)) {
                return Some(Utc::now());
            }
            if started.elapsed() >= budget {
                return None;
            }
            tokio::time::sleep(self.timings.ping_interval()).await;
        }
    }
}
