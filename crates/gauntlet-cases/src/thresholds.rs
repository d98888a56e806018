//! 2.3 threshold management: drive each counter through its limit and
//! verify the alert latch fires exactly once.

use tracing::{info, warn};

use gauntlet_session::{CancelOutcome, Placement};

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::registry::Scenario;

/// Upper bound on probe submissions regardless of threshold settings.
const MAX_ACTIONS: u64 = 10;

/// 2.3.1.1: order-count threshold, covering the counting accuracy check.
pub struct OrderThreshold;

impl Scenario for OrderThreshold {
    fn id(&self) -> &'static str {
        "2.3.1.1"
    }

    fn title(&self) -> &'static str {
        "order count threshold"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let limit = ctx.monitor().thresholds().max_order_count;
        info!(limit, "current order threshold");
        info!(
            count = ctx.monitor().metrics().order_count,
            "orders counted before reset"
        );
        ctx.monitor().reset_counters();
        info!("counters reset");

        if limit == 0 {
            warn!("order threshold disabled, skipping");
            return Ok(());
        }
        ctx.require_contract()?;

        let send_n = MAX_ACTIONS.min(limit + 1);
        info!(send_n, limit, "sending orders to drive the counter through the threshold");
        for i in 0..send_n {
            let req = ctx.open_order(ctx.params().safe_buy_price, "ThresholdProbe");
            if let Placement::Blocked(reason) = ctx.driver().place_order(&req)? {
                warn!(reason = %reason, "probe order blocked");
            }
            let counted = ctx.monitor().metrics().order_count;
            if counted != i + 1 {
                warn!(expected = i + 1, actual = counted, "order count out of step");
            }
        }
        ctx.settle("order statistics and alert");

        let metrics = ctx.monitor().metrics();
        if metrics.order_count == send_n {
            info!(count = metrics.order_count, "order statistics accurate");
        } else {
            warn!(
                expected = send_n,
                actual = metrics.order_count,
                "order statistics inaccurate"
            );
        }
        if metrics.warned_order {
            info!("threshold alert fired");
        } else {
            warn!(limit, "threshold alert did not fire");
        }
        Ok(())
    }
}

/// 2.3.1.3: cancel-count threshold, staged against a batch of resting
/// orders sent by this case.
pub struct CancelThreshold;

impl Scenario for CancelThreshold {
    fn id(&self) -> &'static str {
        "2.3.1.3"
    }

    fn title(&self) -> &'static str {
        "cancel count threshold"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let limit = ctx.monitor().thresholds().max_cancel_count;
        info!(limit, "current cancel threshold");
        info!(
            count = ctx.monitor().metrics().cancel_count,
            "cancels counted so far"
        );

        if limit == 0 {
            warn!("cancel threshold disabled, skipping");
            return Ok(());
        }
        ctx.require_contract()?;

        let stage = (limit + 2).max(5);
        let mut staged = Vec::new();
        for _ in 0..stage {
            let req = ctx.open_order(ctx.params().safe_buy_price, "CancelStage");
            if let Placement::Accepted(id) = ctx.driver().place_order(&req)? {
                staged.push(id);
            }
        }
        ctx.settle("staged orders to rest");

        let need = MAX_ACTIONS.min(limit + 1);
        let start = ctx.monitor().metrics().cancel_count;
        info!(need, available = staged.len(), "cancelling through the threshold");

        let mut sent = 0u64;
        for id in &staged {
            if sent >= need {
                break;
            }
            let Some(snap) = ctx.driver().order(id) else {
                continue;
            };
            if !snap.is_active() {
                continue;
            }
            match ctx.driver().cancel(&snap.to_cancel_request())? {
                CancelOutcome::Sent => sent += 1,
                CancelOutcome::Blocked(reason) => warn!(reason = %reason, "cancel blocked"),
            }
        }
        ctx.settle("cancel statistics and alert");

        let metrics = ctx.monitor().metrics();
        let expected = start + sent;
        if metrics.cancel_count == expected {
            info!(count = metrics.cancel_count, "cancel statistics accurate");
        } else {
            warn!(
                expected,
                actual = metrics.cancel_count,
                "cancel statistics inaccurate"
            );
        }
        if metrics.warned_cancel {
            info!("threshold alert fired");
        } else {
            warn!(limit, "threshold alert did not fire");
        }
        Ok(())
    }
}

/// 2.3.1.5: repeat-submission threshold.
pub struct RepeatThreshold;

impl Scenario for RepeatThreshold {
    fn id(&self) -> &'static str {
        "2.3.1.5"
    }

    fn title(&self) -> &'static str {
        "repeat submission threshold"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let limit = ctx.monitor().thresholds().max_repeat_count;
        info!(limit, "current repeat threshold");

        if limit == 0 {
            info!("repeat alert disabled, skipping");
            return Ok(());
        }
        ctx.require_contract()?;

        let send_n = MAX_ACTIONS.min(limit + 1);
        info!(send_n, "sending identical orders to trip the repeat alert");
        for _ in 0..send_n {
            let req = ctx.open_order(ctx.params().safe_buy_price, "RepeatThresholdProbe");
            ctx.driver().place_order(&req)?;
        }
        ctx.settle("repeat alert evaluation");

        let metrics = ctx.monitor().metrics();
        info!(
            repeat_order_count = metrics.repeat_order_count,
            warned = metrics.warned_repeat,
            "repeat metrics"
        );
        if metrics.warned_repeat {
            info!("threshold alert fired");
        } else {
            warn!(limit, "threshold alert did not fire");
        }
        Ok(())
    }
}
