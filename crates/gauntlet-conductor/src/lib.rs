//! The conductor side of the compliance harness.
//!
//! Owns the worker's lifecycle (start, kill, restart, the disconnect
//! drills) and fronts the loopback control protocol with an operator CLI.
//! The worker process itself lives in its own binary; everything here
//! talks to it over TCP or through the process supervisor.

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod procfile;

pub use config::{ConductorConfig, FaultTimings, RpcTargetConfig};
pub use error::{ConductorError, ConductorResult};
pub use orchestrator::{FaultOutcome, FaultReport, Orchestrator, ProcessReport};
pub use procfile::{ProcFile, WorkerRecord};
