//! Worker process record shared between conductor invocations.
//!
//! The conductor is a one-shot command, but a disconnect drill spans
//! several of them: one invocation kills the worker, a later one brings it
//! back. The supervisor's child handle dies with the process that spawned
//! it, so the pid and the disconnect-mode latch are carried across the gap
//! in a small JSON record on disk. A fresh conductor loads the record,
//! seeds its supervisor latch from it, and can kill an inherited worker by
//! pid alone.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What the last conductor invocation knew about the worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Pid of the spawned worker, cleared when a kill is delivered.
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted disconnect-mode latch.
    #[serde(default)]
    pub disconnect_mode: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Owns the record file. Loaded once, rewritten on every change with a
/// write-to-temp-then-rename so a crashed conductor never leaves a
/// half-written record behind.
pub struct ProcFile {
    path: PathBuf,
    record: Mutex<WorkerRecord>,
}

impl ProcFile {
    /// Loads the record at `path`, starting fresh when the file is missing
    /// or unreadable.
    #[must_use]
    pub fn load(path: PathBuf) -> Self {
        let record = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "worker record unreadable, starting fresh");
                    WorkerRecord::default()
                }
            },
            Err(_) => WorkerRecord::default(),
        };
        Self {
            path,
            record: Mutex::new(record),
        }
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.record.lock().pid
    }

    #[must_use]
    pub fn disconnect_mode(&self) -> bool {
        self.record.lock().disconnect_mode
    }

    /// True when the recorded pid names a live process.
    #[must_use]
    pub fn pid_alive(&self) -> bool {
        self.pid().is_some_and(pid_alive)
    }

    pub fn record_started(&self, pid: u32) {
        self.update(|record| {
            record.pid = Some(pid);
            record.started_at = Some(Utc::now());
        });
    }

    pub fn record_stopped(&self) {
        self.update(|record| {
            record.pid = None;
            record.started_at = None;
        });
    }

    pub fn set_disconnect_mode(&self, engaged: bool) {
        self.update(|record| record.disconnect_mode = engaged);
    }

    /// Applies a change and persists the result. Persistence failures are
    /// logged and swallowed; the in-memory record stays authoritative for
    /// the rest of this invocation.
    fn update(&self, apply: impl FnOnce(&mut WorkerRecord)) {
        let snapshot = {
            let mut record = self.record.lock();
            apply(&mut record);
            record.updated_at = Some(Utc::now());
            record.clone()
        };
        if let Err(e) = self.write(&snapshot) {
            warn!(path = %self.path.display(), error = %e, "worker record not persisted");
        }
    }

    fn write(&self, record: &WorkerRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// True when `pid` names a live process (signal 0 probe).
#[must_use]
pub fn pid_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// SIGKILLs `pid`, tolerant of an already-dead process.
pub fn terminate(pid: u32) {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if rc == 0 {
        info!(pid, "killed recorded worker process");
    } else {
        debug!(pid, "recorded worker already gone");
    }
}
