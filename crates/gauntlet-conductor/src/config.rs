//! Conductor configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gauntlet_supervisor::SupervisorConfig;

use crate::error::{ConductorError, ConductorResult};

/// Control channel section: where the worker listens and how patient each
/// request is. Drill polling wants snappier timeouts than the 5 s client
/// default, so the conductor sets its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTargetConfig {
    #[serde(default = "default_worker_addr")]
    pub worker_addr: SocketAddr,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_worker_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9999))
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

impl RpcTargetConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RpcTargetConfig {
    fn default() -> Self {
        Self {
            worker_addr: default_worker_addr(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Timing knobs for the fault drills. Every wait here is a hard bound;
/// expiry surfaces as a typed outcome, never a hang.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultTimings {
    /// Reachability budget before a drill agrees to start (ms).
    #[serde(default = "default_preflight_timeout_ms")]
    pub preflight_timeout_ms: u64,
    /// Pause between PING attempts while polling (ms).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// How long a restarted worker gets to answer PING (ms).
    #[serde(default = "default_recovery_deadline_ms")]
    pub recovery_deadline_ms: u64,
    /// Outage width held by the combined kill-wait-restart drill (ms).
    #[serde(default = "default_outage_window_ms")]
    pub outage_window_ms: u64,
}

fn default_preflight_timeout_ms() -> u64 {
    2_000
}

fn default_ping_interval_ms() -> u64 {
    500
}

fn default_recovery_deadline_ms() -> u64 {
    15_000
}

fn default_outage_window_ms() -> u64 {
    5_000
}

impl FaultTimings {
    #[must_use]
    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_millis(self.preflight_timeout_ms)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    #[must_use]
    pub fn recovery_deadline(&self) -> Duration {
        Duration::from_millis(self.recovery_deadline_ms)
    }

    #[must_use]
    pub fn outage_window(&self) -> Duration {
        Duration::from_millis(self.outage_window_ms)
    }
}

impl Default for FaultTimings {
    fn default() -> Self {
        Self {
            preflight_timeout_ms: default_preflight_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            recovery_deadline_ms: default_recovery_deadline_ms(),
            outage_window_ms: default_outage_window_ms(),
        }
    }
}

/// Top-level conductor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    /// Where the worker process record lives between invocations. A drill
    /// spans several one-shot commands, so the pid and the disconnect-mode
    /// latch have to survive on disk.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub rpc: RpcTargetConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub faults: FaultTimings,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("config/worker_state.json")
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            rpc: RpcTargetConfig::default(),
            supervisor: SupervisorConfig::default(),
            faults: FaultTimings::default(),
        }
    }
}

impl ConductorConfig {
    /// Load configuration. Path resolution: CLI flag, then
    /// `GAUNTLET_CONDUCTOR_CONFIG`, then `config/conductor.toml`; a missing
    /// file falls back to defaults.
    pub fn load(cli_path: Option<&str>) -> ConductorResult<Self> {
        let path = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var("GAUNTLET_CONDUCTOR_CONFIG").ok())
            .unwrap_or_else(|| "config/conductor.toml".to_string());

        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(path = %path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> ConductorResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConductorError::Config(format!("failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| ConductorError::Config(format!("failed to parse config: {e}")))
    }
}
