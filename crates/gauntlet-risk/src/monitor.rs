//! RiskMonitor: validation gates, counters and one-shot threshold alerts.
//!
//! The monitor is mutated from the gateway-callback task and the RPC task at
//! the same time, so every field is an atomic, a `DashMap`/`DashSet`, or sits
//! behind a `parking_lot::RwLock`. No method takes `&mut self`; share it as
//! `Arc<RiskMonitor>`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gauntlet_core::{CancelRequest, ContractSpec, OrderId, OrderRequest, OrderSnapshot};

use crate::signature::{CancelSignature, OrderSignature};
use crate::thresholds::{RiskMetrics, ThresholdUpdate, Thresholds};

/// Tolerance for the price-tick remainder check.
const TICK_EPSILON: f64 = 1e-6;

// ============================================================================
// RiskConfig
// ============================================================================

/// Static validation knobs. Thresholds are runtime-mutable and live
/// separately; these are fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Symbols rejected outright by the local validity check.
    #[serde(default = "default_symbol_denylist")]
    pub symbol_denylist: Vec<String>,
    /// Per-order volume ceiling. Requests flagged `volume_cap_exempt`
    /// bypass it so oversize probes can reach the gateway.
    #[serde(default = "default_max_order_volume")]
    pub max_order_volume: u32,
}

fn default_symbol_denylist() -> Vec<String> {
    vec!["INVALID".to_string(), "INVALID_CODE".to_string()]
}

fn default_max_order_volume() -> u32 {
    1000
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            symbol_denylist: default_symbol_denylist(),
            max_order_volume: default_max_order_volume(),
        }
    }
}

// ============================================================================
// CheckDecision
// ============================================================================

/// Outcome of a local order/cancel validation.
///
/// A rejection is a value, never an error; rejected requests are not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDecision {
    /// Request may be sent to the gateway.
    Allow,
    /// Request rejected locally with a reason.
    Reject(String),
}

impl CheckDecision {
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject(_))
    }
}

/// Combined `{active, thresholds, metrics}` view for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub active: bool,
    pub thresholds: Thresholds,
    pub metrics: RiskMetrics,
}

// ============================================================================
// RiskMonitor
// ============================================================================

/// Validates and counts order/cancel submissions.
///
/// Counting rules:
/// - `order_count` increments in `check_order`, on the allow path only.
/// - cancel signatures are registered at send time (`register_cancel_request`),
///   but `cancel_count` increments on the cancelled callback, and only for
///   orders this process itself originated.
/// - `rejection_count` increments unconditionally on the rejected callback.
///
/// Each threshold alert fires once per arming epoch, at `count >= threshold`.
/// Threshold 0 disables the alert.
pub struct RiskMonitor {
    config: RiskConfig,
    thresholds: RwLock<Thresholds>,

    /// Emergency-stop gate. False = all order/cancel checks reject.
    active: AtomicBool,

    order_count: AtomicU64,
    cancel_count: AtomicU64,
    rejection_count: AtomicU64,
    repeat_order_count: AtomicU64,
    repeat_cancel_count: AtomicU64,

    warned_order: AtomicBool,
    warned_cancel: AtomicBool,
    warned_repeat: AtomicBool,

    /// Occurrence count per distinct order signature.
    order_signatures: DashMap<OrderSignature, u64>,
    /// Occurrence count per distinct cancel signature.
    cancel_signatures: DashMap<CancelSignature, u64>,
    /// Order ids produced by the current process lifetime. Cancellations of
    /// ids outside this set belong to a prior incarnation and are not counted.
    session_order_ids: DashSet<OrderId>,

    /// Contracts learned from the session's contract events, keyed by symbol.
    contracts: DashMap<String, ContractSpec>,

    /// Last order count surfaced by `on_order_submitted`, so repeated
    /// callback delivery logs each value once.
    last_logged_order_count: AtomicU64,
}

impl RiskMonitor {
    #[must_use]
    pub fn new(config: RiskConfig, thresholds: Thresholds) -> Self {
        Self {
            config,
            thresholds: RwLock::new(thresholds),
            active: AtomicBool::new(true),
            order_count: AtomicU64::new(0),
            cancel_count: AtomicU64::new(0),
            rejection_count: AtomicU64::new(0),
            repeat_order_count: AtomicU64::new(0),
            repeat_cancel_count: AtomicU64::new(0),
            warned_order: AtomicBool::new(false),
            warned_cancel: AtomicBool::new(false),
            warned_repeat: AtomicBool::new(false),
            order_signatures: DashMap::new(),
            cancel_signatures: DashMap::new(),
            session_order_ids: DashSet::new(),
            contracts: DashMap::new(),
            last_logged_order_count: AtomicU64::new(0),
        }
    }

    /// Check an order against the local gates, counting it if allowed.
    ///
    /// Gate order: emergency stop, symbol validity, volume ceiling, price
    /// tick. Only the allow path updates counters and signatures.
    pub fn check_order(&self, req: &OrderRequest) -> CheckDecision {
        if !self.is_active() {
            warn!(symbol = %req.symbol, "order rejected, trading paused");
            return CheckDecision::Reject("trading paused".to_string());
        }

        if self.config.symbol_denylist.iter().any(|s| s == &req.symbol) {
            warn!(symbol = %req.symbol, "order rejected, invalid contract code");
            return CheckDecision::Reject(format!("invalid contract code: {}", req.symbol));
        }

        if req.volume > self.config.max_order_volume && !req.volume_cap_exempt {
            warn!(
                volume = req.volume,
                ceiling = self.config.max_order_volume,
                "order rejected, volume exceeds ceiling"
            );
            return CheckDecision::Reject(format!(
                "volume {} exceeds ceiling {}",
                req.volume, self.config.max_order_volume
            ));
        }

        if let Some(contract) = self.contracts.get(&req.symbol) {
            let tick = contract.price_tick;
            if tick > 0.0 && off_tick_grid(req.price, tick) {
                warn!(
                    price = req.price,
                    tick,
                    symbol = %req.symbol,
                    "order rejected, price off the tick grid"
                );
                return CheckDecision::Reject(format!(
                    "price {} is not a multiple of tick {}",
                    req.price, tick
                ));
            }
        }

        let thresholds = *self.thresholds.read();
        let count = self.order_count.fetch_add(1, Ordering::SeqCst) + 1;

        let occurrences = {
            let mut entry = self
                .order_signatures
                .entry(OrderSignature::of(req))
                .or_insert(0);
            *entry += 1;
            *entry
        };
        if occurrences >= 2 {
            let repeats = self.repeat_order_count.fetch_add(1, Ordering::SeqCst) + 1;
            let total = repeats + self.repeat_cancel_count.load(Ordering::SeqCst);
            self.evaluate_threshold(
                "repeat submissions",
                total,
                thresholds.max_repeat_count,
                &self.warned_repeat,
            );
        }

        self.evaluate_threshold("orders", count, thresholds.max_order_count, &self.warned_order);

        CheckDecision::Allow
    }

    /// Check a cancel. Gates on the emergency stop only; signature
    /// bookkeeping happens in `register_cancel_request` once the caller has
    /// decided to actually send, so counting matches wire sends.
    pub fn check_cancel(&self, req: &CancelRequest) -> CheckDecision {
        if !self.is_active() {
            warn!(order_id = %req.order_id, "cancel rejected, trading paused");
            return CheckDecision::Reject("trading paused".to_string());
        }
        CheckDecision::Allow
    }

    /// Record an order id produced by this process, for session ownership
    /// tracking. Called by the session driver after a successful send.
    pub fn register_order(&self, id: OrderId) {
        self.session_order_ids.insert(id);
    }

    /// Record a cancel that is actually being sent, updating the cancel
    /// signature map and the repeat counter.
    pub fn register_cancel_request(&self, req: &CancelRequest) {
        let thresholds = *self.thresholds.read();
        let occurrences = {
            let mut entry = self
                .cancel_signatures
                .entry(CancelSignature::of(req))
                .or_insert(0);
            *entry += 1;
            *entry
        };
        if occurrences >= 2 {
            let repeats = self.repeat_cancel_count.fetch_add(1, Ordering::SeqCst) + 1;
            let total = self.repeat_order_count.load(Ordering::SeqCst) + repeats;
            self.evaluate_threshold(
                "repeat submissions",
                total,
                thresholds.max_repeat_count,
                &self.warned_repeat,
            );
        }
    }

    /// True when the given order id was produced by this process lifetime.
    #[must_use]
    pub fn owns_order(&self, id: &OrderId) -> bool {
        self.session_order_ids.contains(id)
    }

    /// Order-state callback hook. Counts nothing (counting happened in
    /// `check_order`); surfaces the running order count once per distinct
    /// value even when the gateway re-delivers callbacks.
    pub fn on_order_submitted(&self, order: &OrderSnapshot) {
        let count = self.order_count.load(Ordering::SeqCst);
        if self.last_logged_order_count.swap(count, Ordering::SeqCst) != count {
            info!(order_id = %order.order_id, order_count = count, "current order count");
        }
    }

    /// Cancelled callback hook. Counts only orders this process originated.
    pub fn on_order_cancelled(&self, order: &OrderSnapshot) {
        if !self.owns_order(&order.order_id) {
            debug!(order_id = %order.order_id, "ignoring cancellation of foreign order");
            return;
        }

        let thresholds = *self.thresholds.read();
        let count = self.cancel_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(order_id = %order.order_id, cancel_count = count, "current cancel count");
        self.evaluate_threshold(
            "cancels",
            count,
            thresholds.max_cancel_count,
            &self.warned_cancel,
        );
    }

    /// Rejected callback hook. Counts unconditionally; a request can pass
    /// every local gate, be sent, and still be rejected by the gateway.
    pub fn on_order_rejected(&self, order: &OrderSnapshot) {
        let count = self.rejection_count.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            order_id = %order.order_id,
            code = ?order.reject_code,
            reason = order.reject_reason.as_deref().unwrap_or(""),
            rejection_count = count,
            "gateway rejected order"
        );
    }

    /// Learn a contract definition from the session's contract events.
    pub fn on_contract(&self, contract: ContractSpec) {
        debug!(symbol = %contract.symbol, tick = contract.price_tick, "contract learned");
        self.contracts.insert(contract.symbol.clone(), contract);
    }

    /// Contract previously learned for a symbol.
    #[must_use]
    pub fn contract(&self, symbol: &str) -> Option<ContractSpec> {
        self.contracts.get(symbol).map(|entry| entry.value().clone())
    }

    /// Engage the emergency stop. Idempotent; only an explicit `resume`
    /// re-enables order flow.
    pub fn emergency_stop(&self) {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            warn!("emergency stop engaged, rejecting all order flow");
        } else {
            debug!("emergency stop already engaged");
        }
    }

    /// Re-enable order flow after an emergency stop.
    pub fn resume(&self) {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("trading resumed");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Apply a partial threshold update and re-arm the matching alert
    /// latches so the next breach under the new limit alerts again.
    pub fn set_thresholds(&self, update: ThresholdUpdate) -> Thresholds {
        let updated = {
            let mut guard = self.thresholds.write();
            guard.apply(&update);
            *guard
        };
        if update.max_order_count.is_some() {
            self.warned_order.store(false, Ordering::SeqCst);
        }
        if update.max_cancel_count.is_some() {
            self.warned_cancel.store(false, Ordering::SeqCst);
        }
        if update.max_repeat_count.is_some() {
            self.warned_repeat.store(false, Ordering::SeqCst);
        }
        info!(
            max_order_count = updated.max_order_count,
            max_cancel_count = updated.max_cancel_count,
            max_repeat_count = updated.max_repeat_count,
            "thresholds updated"
        );
        updated
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.read()
    }

    #[must_use]
    pub fn metrics(&self) -> RiskMetrics {
        RiskMetrics {
            order_count: self.order_count.load(Ordering::SeqCst),
            cancel_count: self.cancel_count.load(Ordering::SeqCst),
            rejection_count: self.rejection_count.load(Ordering::SeqCst),
            repeat_order_count: self.repeat_order_count.load(Ordering::SeqCst),
            repeat_cancel_count: self.repeat_cancel_count.load(Ordering::SeqCst),
            warned_order: self.warned_order.load(Ordering::SeqCst),
            warned_cancel: self.warned_cancel.load(Ordering::SeqCst),
            warned_repeat: self.warned_repeat.load(Ordering::SeqCst),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            active: self.is_active(),
            thresholds: self.thresholds(),
            metrics: self.metrics(),
        }
    }

    /// Zero every counter, clear the signature maps and session ids, and
    /// re-arm every alert latch. Leaves `active` and thresholds untouched.
    pub fn reset_counters(&self) {
        self.order_count.store(0, Ordering::SeqCst);
        self.cancel_count.store(0, Ordering::SeqCst);
        self.rejection_count.store(0, Ordering::SeqCst);
        self.repeat_order_count.store(0, Ordering::SeqCst);
        self.repeat_cancel_count.store(0, Ordering::SeqCst);
        self.warned_order.store(false, Ordering::SeqCst);
        self.warned_cancel.store(false, Ordering::SeqCst);
        self.warned_repeat.store(false, Ordering::SeqCst);
        self.order_signatures.clear();
        self.cancel_signatures.clear();
        self.session_order_ids.clear();
        self.last_logged_order_count.store(0, Ordering::SeqCst);
        info!("risk counters reset");
    }

    /// Forget the order ids of the previous case run. Called by the case
    /// wrapper so ownership tracking starts fresh for every scenario.
    pub fn clear_session_orders(&self) {
        self.session_order_ids.clear();
    }

    fn evaluate_threshold(
        &self,
        label: &'static str,
        count: u64,
        threshold: u64,
        warned: &AtomicBool,
    ) {
        if threshold == 0 {
            return;
        }
        if count >= threshold
            && warned
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            warn!(count, threshold, "{} threshold reached", label);
        }
    }
}

/// True when `price` does not land on the `tick` grid within tolerance.
///
/// The remainder of an exact multiple computes as either ~0 or ~tick
/// depending on float rounding, so both ends are accepted.
fn off_tick_grid(price: f64, tick: f64) -> bool {
    let remainder = (price % tick).abs();
    !(remainder < TICK_EPSILON || (remainder - tick).abs() < TICK_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gauntlet_core::{Direction, Exchange, Offset, OrderKind, OrderStatus};

    fn monitor() -> RiskMonitor {
        RiskMonitor::new(RiskConfig::default(), Thresholds::default())
    }

    fn monitor_with(thresholds: Thresholds) -> RiskMonitor {
        RiskMonitor::new(RiskConfig::default(), thresholds)
    }

    fn order(symbol: &str, price: f64, volume: u32) -> OrderRequest {
        OrderRequest {
            symbol: symbol.to_string(),
            exchange: Exchange::Cffex,
            direction: Direction::Long,
            offset: Offset::Open,
            kind: OrderKind::Limit,
            volume,
            price,
            reference: String::new(),
            volume_cap_exempt: false,
        }
    }

    fn cancel(order_id: &str) -> CancelRequest {
        CancelRequest {
            order_id: OrderId::new(order_id),
            symbol: "IF2601".to_string(),
            exchange: Exchange::Cffex,
        }
    }

    fn cancelled_snapshot(order_id: &str) -> OrderSnapshot {
        OrderSnapshot {
            order_id: OrderId::new(order_id),
            symbol: "IF2601".to_string(),
            exchange: Exchange::Cffex,
            direction: Direction::Long,
            offset: Offset::Open,
            kind: OrderKind::Limit,
            volume: 1,
            traded: 0,
            price: 4000.0,
            status: OrderStatus::Cancelled,
            reject_code: None,
            reject_reason: None,
            updated_at: Utc::now(),
        }
    }

    fn rejected_snapshot(order_id: &str, code: i32) -> OrderSnapshot {
        let mut snap = cancelled_snapshot(order_id);
        snap.status = OrderStatus::Rejected;
        snap.reject_code = Some(code);
        snap.reject_reason = Some("test rejection".to_string());
        snap
    }

    fn contract(symbol: &str, tick: f64) -> ContractSpec {
        ContractSpec {
            symbol: symbol.to_string(),
            exchange: Exchange::Cffex,
            name: symbol.to_string(),
            price_tick: tick,
        }
    }

    // === validation gates ===

    #[test]
    fn test_valid_order_allowed_and_counted() {
        let m = monitor();
        assert!(m.check_order(&order("IF2601", 4000.0, 1)).is_allow());
        assert_eq!(m.metrics().order_count, 1);
    }

    #[test]
    fn test_emergency_stop_rejects_without_counting() {
        let m = monitor();
        m.emergency_stop();
        assert!(m.check_order(&order("IF2601", 4000.0, 1)).is_reject());
        assert!(m.check_cancel(&cancel("sim.1")).is_reject());
        assert_eq!(m.metrics().order_count, 0);

        m.resume();
        assert!(m.check_order(&order("IF2601", 4000.0, 1)).is_allow());
        assert_eq!(m.metrics().order_count, 1);
    }

    #[test]
    fn test_emergency_stop_idempotent() {
        let m = monitor();
        m.emergency_stop();
        m.emergency_stop();
        assert!(!m.is_active());
    }

    #[test]
    fn test_denylisted_symbol_rejected_without_counting() {
        let m = monitor();
        assert!(m.check_order(&order("INVALID_CODE", 4000.0, 1)).is_reject());
        assert!(m.check_order(&order("INVALID", 4000.0, 1)).is_reject());
        assert_eq!(m.metrics().order_count, 0);
    }

    #[test]
    fn test_volume_ceiling() {
        let m = monitor();
        assert!(m.check_order(&order("IF2601", 4000.0, 1001)).is_reject());
        assert_eq!(m.metrics().order_count, 0);

        let mut exempt = order("IF2601", 4000.0, 1001);
        exempt.volume_cap_exempt = true;
        assert!(m.check_order(&exempt).is_allow());
        assert_eq!(m.metrics().order_count, 1);
    }

    #[test]
    fn test_tick_check_requires_known_contract() {
        let m = monitor();
        // No contract learned yet: any price passes.
        assert!(m.check_order(&order("IF2601", 4660.1, 1)).is_allow());

        m.on_contract(contract("IF2601", 0.2));
        assert!(m.check_order(&order("IF2601", 4660.0, 1)).is_allow());
        assert!(m.check_order(&order("IF2601", 4660.1, 1)).is_reject());
        // Sub-epsilon float noise still lands on the grid.
        assert!(m.check_order(&order("IF2601", 4660.0000001, 1)).is_allow());
        // One tenth of a tick off: rejected.
        assert!(m.check_order(&order("IF2601", 4660.0001, 1)).is_reject());
    }

    #[test]
    fn test_tick_check_skips_other_symbols() {
        let m = monitor();
        m.on_contract(contract("IF2601", 0.2));
        assert!(m.check_order(&order("rb2601", 4660.1, 1)).is_allow());
    }

    // === counters and repeats ===

    #[test]
    fn test_repeat_order_counting() {
        let m = monitor();
        let req = order("IF2601", 4000.0, 1);

        m.check_order(&req);
        assert_eq!(m.metrics().repeat_order_count, 0);

        m.check_order(&req);
        assert_eq!(m.metrics().repeat_order_count, 1);

        m.check_order(&req);
        assert_eq!(m.metrics().repeat_order_count, 2);

        // A different price is a different logical instruction.
        m.check_order(&order("IF2601", 4000.2, 1));
        assert_eq!(m.metrics().repeat_order_count, 2);
        assert_eq!(m.metrics().order_count, 4);
    }

    #[test]
    fn test_repeat_cancel_counting() {
        let m = monitor();
        let req = cancel("sim.1");

        m.register_cancel_request(&req);
        assert_eq!(m.metrics().repeat_cancel_count, 0);

        m.register_cancel_request(&req);
        assert_eq!(m.metrics().repeat_cancel_count, 1);

        m.register_cancel_request(&cancel("sim.2"));
        assert_eq!(m.metrics().repeat_cancel_count, 1);
    }

    #[test]
    fn test_cancel_counted_only_for_session_orders() {
        let m = monitor();
        m.register_order(OrderId::new("sim.1"));

        m.on_order_cancelled(&cancelled_snapshot("sim.1"));
        assert_eq!(m.metrics().cancel_count, 1);

        // Unknown id belongs to a prior incarnation.
        m.on_order_cancelled(&cancelled_snapshot("sim.99"));
        assert_eq!(m.metrics().cancel_count, 1);
    }

    #[test]
    fn test_rejection_counted_unconditionally() {
        let m = monitor();
        m.on_order_rejected(&rejected_snapshot("sim.1", 31));
        m.on_order_rejected(&rejected_snapshot("foreign.7", 16));
        assert_eq!(m.metrics().rejection_count, 2);
    }

    // === threshold latches ===

    #[test]
    fn test_order_threshold_latches_at_exact_count() {
        let m = monitor_with(Thresholds {
            max_order_count: 3,
            max_cancel_count: 5,
            max_repeat_count: 0,
        });

        m.check_order(&order("IF2601", 4000.0, 1));
        m.check_order(&order("IF2601", 4000.2, 1));
        assert!(!m.metrics().warned_order);

        m.check_order(&order("IF2601", 4000.4, 1));
        assert!(m.metrics().warned_order);

        // Stays latched through further events.
        m.check_order(&order("IF2601", 4000.6, 1));
        assert!(m.metrics().warned_order);
    }

    #[test]
    fn test_cancel_threshold_latch() {
        let m = monitor_with(Thresholds {
            max_order_count: 0,
            max_cancel_count: 2,
            max_repeat_count: 0,
        });
        m.register_order(OrderId::new("sim.1"));
        m.register_order(OrderId::new("sim.2"));

        m.on_order_cancelled(&cancelled_snapshot("sim.1"));
        assert!(!m.metrics().warned_cancel);
        m.on_order_cancelled(&cancelled_snapshot("sim.2"));
        assert!(m.metrics().warned_cancel);
    }

    #[test]
    fn test_repeat_threshold_counts_orders_and_cancels_together() {
        let m = monitor_with(Thresholds {
            max_order_count: 0,
            max_cancel_count: 0,
            max_repeat_count: 2,
        });

        let req = order("IF2601", 4000.0, 1);
        m.check_order(&req);
        m.check_order(&req);
        assert_eq!(m.metrics().repeat_total(), 1);
        assert!(!m.metrics().warned_repeat);

        let creq = cancel("sim.1");
        m.register_cancel_request(&creq);
        m.register_cancel_request(&creq);
        assert_eq!(m.metrics().repeat_total(), 2);
        assert!(m.metrics().warned_repeat);
    }

    #[test]
    fn test_zero_threshold_never_alerts() {
        let m = monitor_with(Thresholds {
            max_order_count: 0,
            max_cancel_count: 0,
            max_repeat_count: 0,
        });
        for i in 0..10 {
            m.check_order(&order("IF2601", 4000.0 + f64::from(i), 1));
        }
        assert!(!m.metrics().warned_order);
    }

    #[test]
    fn test_set_thresholds_rearms_matching_latch_only() {
        let m = monitor_with(Thresholds {
            max_order_count: 1,
            max_cancel_count: 1,
            max_repeat_count: 0,
        });
        m.register_order(OrderId::new("sim.1"));
        m.check_order(&order("IF2601", 4000.0, 1));
        m.on_order_cancelled(&cancelled_snapshot("sim.1"));
        assert!(m.metrics().warned_order);
        assert!(m.metrics().warned_cancel);

        m.set_thresholds(ThresholdUpdate {
            max_order_count: Some(2),
            ..Default::default()
        });
        let metrics = m.metrics();
        assert!(!metrics.warned_order, "updated latch re-armed");
        assert!(metrics.warned_cancel, "untouched latch stays");

        // Next breach under the new limit alerts again.
        m.check_order(&order("IF2601", 4000.2, 1));
        assert!(m.metrics().warned_order);
    }

    // === reset ===

    #[test]
    fn test_reset_counters_clears_state_but_not_thresholds() {
        let m = monitor();
        let req = order("IF2601", 4000.0, 1);
        m.check_order(&req);
        m.check_order(&req);
        m.register_order(OrderId::new("sim.1"));
        m.on_order_cancelled(&cancelled_snapshot("sim.1"));
        m.on_order_rejected(&rejected_snapshot("sim.2", 31));

        m.reset_counters();

        assert_eq!(m.metrics(), RiskMetrics::default());
        assert_eq!(m.thresholds(), Thresholds::default());
        assert!(m.is_active());

        // Signature history is gone: a resend is not a repeat.
        m.check_order(&req);
        assert_eq!(m.metrics().repeat_order_count, 0);
    }

    #[test]
    fn test_reset_does_not_touch_emergency_stop() {
        let m = monitor();
        m.emergency_stop();
        m.reset_counters();
        assert!(!m.is_active());
    }

    #[test]
    fn test_clear_session_orders_drops_ownership() {
        let m = monitor();
        m.register_order(OrderId::new("sim.1"));
        assert!(m.owns_order(&OrderId::new("sim.1")));

        m.clear_session_orders();
        assert!(!m.owns_order(&OrderId::new("sim.1")));
        m.on_order_cancelled(&cancelled_snapshot("sim.1"));
        assert_eq!(m.metrics().cancel_count, 0);
    }

    // === tick helper ===

    #[test]
    fn test_off_tick_grid_accepts_both_remainder_ends() {
        // 4660.0 % 0.2 computes as ~0.1999999999997, the tick end.
        assert!(!off_tick_grid(4660.0, 0.2));
        assert!(!off_tick_grid(4000.0, 0.2));
        assert!(off_tick_grid(4660.1, 0.2));
        assert!(off_tick_grid(4660.0001, 0.2));
    }
}
