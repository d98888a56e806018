//! Risk monitoring for the gauntlet compliance harness.
//!
//! Validates and counts order/cancel traffic on its way to the gateway:
//! - CheckDecision: local validation gates (emergency stop, symbol, volume, tick)
//! - RiskMonitor: counters, duplicate-submission detection, one-shot threshold alerts
//! - Thresholds: runtime-tunable alert limits
//!
//! Every public operation returns a value; rejections are outcomes, not errors.

pub mod monitor;
pub mod signature;
pub mod thresholds;

pub use monitor::{CheckDecision, RiskConfig, RiskMonitor, RiskSnapshot};
pub use signature::{CancelSignature, OrderSignature};
pub use thresholds::{RiskMetrics, ThresholdUpdate, Thresholds};
