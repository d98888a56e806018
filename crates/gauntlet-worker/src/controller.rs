//! The production `ControlHandler`: RPC dispatch, single-slot case runner,
//! status reporting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gauntlet_cases::{CaseContext, CaseRegistry, TestParams};
use gauntlet_risk::{RiskSnapshot, ThresholdUpdate};
use gauntlet_rpc::ControlHandler;
use gauntlet_session::SessionDriver;

use crate::config::ParamOverrides;

/// Single-slot task lock. Exactly one scenario may execute at a time;
/// scenarios mutate shared session and risk state and are not written to
/// tolerate each other.
struct TaskSlot {
    occupied: AtomicBool,
    current: Mutex<Option<String>>,
}

impl TaskSlot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            occupied: AtomicBool::new(false),
            current: Mutex::new(None),
        })
    }

    /// Non-blocking acquire. The returned guard frees the slot on drop,
    /// panic included.
    fn try_acquire(self: &Arc<Self>, case_id: &str) -> Option<SlotGuard> {
        if self
            .occupied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.current.lock() = Some(case_id.to_string());
            Some(SlotGuard {
                slot: Arc::clone(self),
            })
        } else {
            None
        }
    }

    fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::SeqCst)
    }

    fn current_id(&self) -> Option<String> {
        self.current.lock().clone()
    }
}

struct SlotGuard {
    slot: Arc<TaskSlot>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        *self.slot.current.lock() = None;
        self.slot.occupied.store(false, Ordering::SeqCst);
    }
}

/// Where finished cases leave their trace for status reporting.
#[derive(Default)]
struct CaseJournal {
    last_error: Mutex<Option<String>>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
}

/// The `GET_STATUS` projection.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub busy: bool,
    pub current_case_id: Option<String>,
    pub session_connected: bool,
    pub last_error: Option<String>,
    pub last_case_finished_at: Option<DateTime<Utc>>,
    pub risk: RiskSnapshot,
}

/// Composes the session driver, the case registry and the tunable test
/// parameters behind the control protocol.
pub struct WorkerController {
    driver: Arc<SessionDriver>,
    registry: CaseRegistry,
    params: RwLock<TestParams>,
    settle: Duration,
    overrides_path: PathBuf,
    slot: Arc<TaskSlot>,
    journal: Arc<CaseJournal>,
}

impl WorkerController {
    #[must_use]
    pub fn new(
        driver: Arc<SessionDriver>,
        registry: CaseRegistry,
        params: TestParams,
        settle: Duration,
        overrides_path: PathBuf,
    ) -> Self {
        Self {
            driver,
            registry,
            params: RwLock::new(params),
            settle,
            overrides_path,
            slot: TaskSlot::new(),
            journal: Arc::new(CaseJournal::default()),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            busy: self.slot.is_occupied(),
            current_case_id: self.slot.current_id(),
            session_connected: self.driver.is_connected(),
            last_error: self.journal.last_error.lock().clone(),
            last_case_finished_at: *self.journal.finished_at.lock(),
            risk: self.driver.monitor().snapshot(),
        }
    }

    /// Non-blocking case submission. Occupied slot answers
    /// `{accepted:false}`; an unknown case id is an error.
    fn run_case(&self, payload: &Value) -> Result<Option<Value>, String> {
        let case_id = payload
            .get("case_id")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing case_id".to_string())?;
        let scenario = self
            .registry
            .get(case_id)
            .ok_or_else(|| format!("unknown case: {case_id}"))?;

        let Some(guard) = self.slot.try_acquire(case_id) else {
            let running = self.slot.current_id();
            info!(
                case_id,
                running = running.as_deref().unwrap_or(""),
                "case refused, runner busy"
            );
            return Ok(Some(json!({
                "accepted": false,
                "case_id": case_id,
                "running": running,
            })));
        };

        // Ownership tracking starts fresh for every run: cancels of orders
        // left over from an earlier case must not count.
        self.driver.monitor().clear_session_orders();

        let ctx = CaseContext::new(
            Arc::clone(&self.driver),
            self.params.read().clone(),
            self.settle,
        );
        let journal = Arc::clone(&self.journal);
        let id = scenario.id();
        let title = scenario.title();

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            info!(case_id = id, title, "case started");
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scenario.run(&ctx)));
            let failure = match outcome {
                Ok(Ok(())) => {
                    info!(case_id = id, "case finished");
                    None
                }
                Ok(Err(e)) => {
                    error!(case_id = id, error = %e, "case failed");
                    Some(e.to_string())
                }
                Err(_) => {
                    error!(case_id = id, "case panicked");
                    Some(format!("case {id} panicked"))
                }
            };
            *journal.last_error.lock() = failure;
            *journal.finished_at.lock() = Some(Utc::now());
        });

        Ok(Some(json!({"accepted": true, "case_id": case_id})))
    }

    fn set_thresholds(&self, payload: &Value) -> Result<Option<Value>, String> {
        let update: ThresholdUpdate = serde_json::from_value(payload.clone())
            .map_err(|e| format!("invalid thresholds: {e}"))?;
        if update.is_empty() {
            return Err("no recognized fields in payload".to_string());
        }
        let updated = self.driver.monitor().set_thresholds(update);
        encode(&updated)
    }

    fn set_test_config(&self, payload: &Value) -> Result<Option<Value>, String> {
        let update: ParamOverrides = serde_json::from_value(payload.clone())
            .map_err(|e| format!("invalid test config: {e}"))?;
        if update.is_empty() {
            return Err("no recognized fields in payload".to_string());
        }

        let effective = {
            let mut params = self.params.write();
            update.apply(&mut params);
            params.clone()
        };
        // The runtime update stands even when persistence fails; the next
        // restart just comes up with the previous values.
        if let Err(e) = ParamOverrides::pin(&effective).save(&self.overrides_path) {
            warn!(
                error = %e,
                path = %self.overrides_path.display(),
                "failed to persist test config overrides"
            );
        }
        info!(
            symbol = %effective.test_symbol,
            safe_buy_price = effective.safe_buy_price,
            deal_buy_price = effective.deal_buy_price,
            "test config updated"
        );
        encode(&effective)
    }

    fn reset_risk(&self) -> Result<Option<Value>, String> {
        let monitor = self.driver.monitor();
        monitor.resume();
        monitor.reset_counters();
        Ok(None)
    }
}

impl ControlHandler for WorkerController {
    fn handle(&self, kind: &str, payload: &Value) -> Result<Option<Value>, String> {
        match kind {
            "PING" => Ok(Some(json!({"pong": true}))),
            "GET_STATUS" => encode(&self.status()),
            "GET_RISK_SNAPSHOT" => encode(&self.driver.monitor().snapshot()),
            "GET_THRESHOLDS" => encode(&self.driver.monitor().thresholds()),
            "SET_THRESHOLDS" => self.set_thresholds(payload),
            "RESET_RISK" => self.reset_risk(),
            "RUN_CASE" => self.run_case(payload),
            "GET_TEST_CONFIG" => encode(&*self.params.read()),
            "SET_TEST_CONFIG" => self.set_test_config(payload),
            "DISCONNECT" => self
                .driver
                .disconnect()
                .map(|()| None)
                .map_err(|e| e.to_string()),
            "RECONNECT" => self
                .driver
                .reconnect()
                .map(|()| None)
                .map_err(|e| e.to_string()),
            "PAUSE" => {
                self.driver.monitor().emergency_stop();
                Ok(None)
            }
            other => Err(format!("unknown_type: {other}")),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Option<Value>, String> {
    serde_json::to_value(value).map(Some).map_err(|e| e.to_string())
}

/// Logs the status snapshot once a second. The original worker pushed this
/// to its dashboard; the log stream is the sink here.
pub fn spawn_heartbeat(
    controller: Arc<WorkerController>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("heartbeat stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let status = controller.status();
                    debug!(
                        busy = status.busy,
                        case = status.current_case_id.as_deref().unwrap_or(""),
                        connected = status.session_connected,
                        orders = status.risk.metrics.order_count,
                        cancels = status.risk.metrics.cancel_count,
                        rejections = status.risk.metrics.rejection_count,
                        "heartbeat"
                    );
                }
            }
        }
    })
}
