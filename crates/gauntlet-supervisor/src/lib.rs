//! Process supervision for the trading-session worker.
//!
//! The conductor uses this crate to start, kill and resurrect the worker
//! process during disconnect drills. See [`WorkerSupervisor`].

pub mod error;
pub mod supervisor;

pub use error::{SupervisorError, SupervisorResult};
pub use supervisor::{SupervisorConfig, WorkerState, WorkerSupervisor};
