//! The compliance test catalogue.
//!
//! Each scenario is a self-contained probe against the session layer: it
//! stages orders, drives the risk monitor, and logs what it observes. The
//! worker looks cases up by catalogue id in [`CaseRegistry`] and runs them
//! one at a time on a dedicated task thread.

pub mod audit;
pub mod connectivity;
pub mod context;
pub mod controls;
pub mod error;
pub mod monitoring;
pub mod registry;
pub mod rejections;
pub mod thresholds;

pub use context::{CaseContext, TestParams};
pub use error::{CaseError, CaseResult};
pub use registry::{CaseRegistry, Scenario};
