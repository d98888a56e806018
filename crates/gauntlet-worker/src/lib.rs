//! The worker process of the compliance harness.
//!
//! Hosts the gateway session, the risk monitor and the scenario runner, and
//! exposes them on the loopback control protocol for the conductor and the
//! operator tooling.

pub mod app;
pub mod config;
pub mod controller;
pub mod error;

pub use app::Worker;
pub use config::{ParamOverrides, WorkerConfig};
pub use controller::{spawn_heartbeat, StatusSnapshot, WorkerController};
pub use error::{WorkerError, WorkerResult};
