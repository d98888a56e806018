//! Lifecycle management for the out-of-process worker.
//!
//! Killing the worker is a test primitive here, not a failure path: the
//! disconnect drills SIGKILL the process on purpose and watch how the rest
//! of the system copes. The disconnect-mode latch keeps such a simulated
//! outage from being "healed" by a routine start call before the drill is
//! over; only a forced start or a restart clears the way.

use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SupervisorResult;

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Never started, or the handle was dropped.
    Absent,
    Running,
    /// Terminated by [`WorkerSupervisor::kill`].
    Killed,
    /// Exited on its own.
    Exited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Program spawned as the worker process.
    #[serde(default = "default_worker_program")]
    pub worker_program: String,
    #[serde(default)]
    pub worker_args: Vec<String>,
    /// Working directory for the child, also exported as `GAUNTLET_ROOT`.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Settle pause between the kill and the forced start of a restart.
    #[serde(default = "default_restart_settle_ms")]
    pub restart_settle_ms: u64,
}

fn default_worker_program() -> String {
    "gauntlet-worker".to_string()
}

fn default_project_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_restart_settle_ms() -> u64 {
    200
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_program: default_worker_program(),
            worker_args: Vec::new(),
            project_root: default_project_root(),
            restart_settle_ms: default_restart_settle_ms(),
        }
    }
}

struct ProcessSlot {
    child: Option<Child>,
    killed: bool,
}

/// Owns the worker process handle.
///
/// The handle is read from the orchestrator and the status loop at the same
/// time, so every access goes through one mutex. No method holds the lock
/// across an await point.
pub struct WorkerSupervisor {
    config: SupervisorConfig,
    slot: Mutex<ProcessSlot>,
    disconnect_mode: AtomicBool,
}

impl WorkerSupervisor {
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(ProcessSlot {
                child: None,
                killed: false,
            }),
            disconnect_mode: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    pub fn state(&self) -> WorkerState {
        let mut slot = self.slot.lock();
        let killed = slot.killed;
        match slot.child.as_mut() {
            None => WorkerState::Absent,
            Some(child) => match child.try_wait() {
                Ok(None) => WorkerState::Running,
                _ if killed => WorkerState::Killed,
                _ => WorkerState::Exited,
            },
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.slot.lock().child.as_ref().map(Child::id)
    }

    #[must_use]
    pub fn disconnect_mode(&self) -> bool {
        self.disconnect_mode.load(Ordering::SeqCst)
    }

    /// Arms the latch that suppresses non-forced starts.
    pub fn enter_disconnect_mode(&self) {
        self.disconnect_mode.store(true, Ordering::SeqCst);
        info!("disconnect mode entered, automatic worker starts suppressed");
    }

    pub fn exit_disconnect_mode(&self) {
        self.disconnect_mode.store(false, Ordering::SeqCst);
        info!("disconnect mode cleared");
    }

    /// Starts the worker unless it is already running.
    ///
    /// Returns `Ok(false)` when suppressed by disconnect mode, `Ok(true)`
    /// when the worker is running on return (whether or not this call
    /// spawned it).
    pub fn start(&self, force: bool) -> SupervisorResult<bool> {
        if self.disconnect_mode() && !force {
            info!("worker start suppressed by disconnect mode");
            return Ok(false);
        }

        let mut slot = self.slot.lock();
        if let Some(child) = slot.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                debug!("worker already running");
                return Ok(true);
            }
        }

        let child = Command::new(&self.config.worker_program)
            .args(&self.config.worker_args)
            .current_dir(&self.config.project_root)
            .env("GAUNTLET_ROOT", &self.config.project_root)
            .spawn()?;
        info!(pid = child.id(), program = %self.config.worker_program, "worker started");
        slot.child = Some(child);
        slot.killed = false;
        Ok(true)
    }

    /// Forceful termination, tolerant of an already-dead or absent worker.
    /// The exit is reaped before returning so `state()` is immediately
    /// truthful.
    pub fn kill(&self) {
        let mut slot = self.slot.lock();
        let Some(child) = slot.child.as_mut() else {
            debug!("kill requested with no worker process");
            return;
        };
        let pid = child.id();
        if let Err(e) = child.kill() {
            debug!(pid, error = %e, "kill on already-dead worker");
        }
        let _ = child.wait();
        slot.killed = true;
        warn!(pid, "worker killed");
    }

    /// Clears disconnect mode, kills the worker, waits out the settle
    /// interval and force-starts a fresh one.
    pub async fn restart(&self) -> SupervisorResult<bool> {
        self.exit_disconnect_mode();
        self.kill();
        tokio::time::sleep(Duration::from_millis(self.config.restart_settle_ms)).await;
        self.start(true)
    }
}
