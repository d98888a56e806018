//! Threshold store and counter projections.
//!
//! Thresholds are runtime-tunable; `0` disables the corresponding alert.

use serde::{Deserialize, Serialize};

/// Alert thresholds for the risk counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Alert when `order_count` reaches this value. 0 = disabled.
    #[serde(default = "default_max_order_count")]
    pub max_order_count: u64,
    /// Alert when `cancel_count` reaches this value. 0 = disabled.
    #[serde(default = "default_max_cancel_count")]
    pub max_cancel_count: u64,
    /// Alert when the combined repeat count reaches this value. 0 = disabled.
    #[serde(default = "default_max_repeat_count")]
    pub max_repeat_count: u64,
}

fn default_max_order_count() -> u64 {
    5
}

fn default_max_cancel_count() -> u64 {
    5
}

fn default_max_repeat_count() -> u64 {
    2
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_order_count: default_max_order_count(),
            max_cancel_count: default_max_cancel_count(),
            max_repeat_count: default_max_repeat_count(),
        }
    }
}

impl Thresholds {
    /// Apply a partial update, leaving omitted fields unchanged.
    pub fn apply(&mut self, update: &ThresholdUpdate) {
        if let Some(v) = update.max_order_count {
            self.max_order_count = v;
        }
        if let Some(v) = update.max_cancel_count {
            self.max_cancel_count = v;
        }
        if let Some(v) = update.max_repeat_count {
            self.max_repeat_count = v;
        }
    }
}

/// Partial threshold update. Omitted fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub max_order_count: Option<u64>,
    #[serde(default)]
    pub max_cancel_count: Option<u64>,
    #[serde(default)]
    pub max_repeat_count: Option<u64>,
}

impl ThresholdUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_order_count.is_none()
            && self.max_cancel_count.is_none()
            && self.max_repeat_count.is_none()
    }
}

/// Read projection of the risk counters and alert latches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub order_count: u64,
    pub cancel_count: u64,
    pub rejection_count: u64,
    pub repeat_order_count: u64,
    pub repeat_cancel_count: u64,
    pub warned_order: bool,
    pub warned_cancel: bool,
    pub warned_repeat: bool,
}

impl RiskMetrics {
    /// Combined duplicate-submission count (orders + cancels).
    #[must_use]
    pub fn repeat_total(&self) -> u64 {
        self.repeat_order_count + self.repeat_cancel_count
    }
}
