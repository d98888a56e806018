//! 2.5 interventions: halting order flow and flattening the book.

use tracing::{info, warn};

use gauntlet_session::{CancelOutcome, Placement};

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::registry::Scenario;

/// 2.5.1.1 / 2.5.1.2: both halt drills route through the emergency stop;
/// while it is engaged every order must be rejected before the wire.
pub struct TradingHalt {
    id: &'static str,
    title: &'static str,
    note: &'static str,
}

impl TradingHalt {
    pub const PERMISSION: Self = Self {
        id: "2.5.1.1",
        title: "trading permission revoked",
        note: "revoking the trading permission engages the emergency stop",
    };

    pub const PAUSE: Self = Self {
        id: "2.5.1.2",
        title: "strategy paused",
        note: "pausing the strategy engages the emergency stop",
    };
}

impl Scenario for TradingHalt {
    fn id(&self) -> &'static str {
        self.id
    }

    fn title(&self) -> &'static str {
        self.title
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;
        info!("{}", self.note);
        ctx.monitor().emergency_stop();

        let req = ctx.open_order(ctx.params().safe_buy_price, "HaltProbe");
        match ctx.driver().place_order(&req)? {
            Placement::Blocked(reason) => info!(reason = %reason, "probe blocked while halted"),
            Placement::Accepted(order_id) => {
                warn!(order_id = %order_id, "probe accepted while halted");
            }
        }
        ctx.settle("halt evidence");

        ctx.monitor().resume();
        Ok(())
    }
}

/// 2.5.2.1: stage one resting order and withdraw it.
pub struct CancelOne;

impl Scenario for CancelOne {
    fn id(&self) -> &'static str {
        "2.5.2.1"
    }

    fn title(&self) -> &'static str {
        "single order cancellation"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;
        // An aborted halt drill must not poison this case.
        ctx.monitor().resume();

        let req = ctx.open_order(ctx.params().safe_buy_price, "PartCancel");
        let order_id = match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => order_id,
            Placement::Blocked(reason) => {
                warn!(reason = %reason, "staging order blocked");
                return Ok(());
            }
        };
        ctx.settle("order acknowledgement");

        match ctx.driver().order(&order_id) {
            Some(snap) if snap.is_active() => {
                match ctx.driver().cancel(&snap.to_cancel_request())? {
                    CancelOutcome::Sent => {
                        ctx.settle("cancel confirmation");
                        if let Some(done) = ctx.driver().order(&order_id) {
                            info!(order_id = %order_id, status = ?done.status, "cancel settled");
                        }
                    }
                    CancelOutcome::Blocked(reason) => {
                        warn!(order_id = %order_id, reason = %reason, "cancel blocked");
                    }
                }
            }
            Some(snap) => {
                warn!(order_id = %order_id, status = ?snap.status, "order left the book before the cancel");
            }
            None => warn!(order_id = %order_id, "no snapshot for the staged order"),
        }
        Ok(())
    }
}

/// 2.5.2.2: stage several resting orders and sweep them all.
pub struct CancelAll;

impl Scenario for CancelAll {
    fn id(&self) -> &'static str {
        "2.5.2.2"
    }

    fn title(&self) -> &'static str {
        "cancel all working orders"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;
        ctx.monitor().resume();

        for i in 1..=3 {
            let req = ctx.open_order(ctx.params().safe_buy_price, &format!("Batch{i}"));
            if let Placement::Blocked(reason) = ctx.driver().place_order(&req)? {
                warn!(reason = %reason, "staging order blocked");
            }
        }
        ctx.settle("book population");

        let working = ctx.driver().active_orders().len();
        info!(working, "working orders before the sweep");

        let sent = ctx.cancel_active_orders();
        ctx.settle("cancel confirmations");
        info!(
            sent,
            remaining = ctx.driver().active_orders().len(),
            "sweep complete"
        );
        Ok(())
    }
}
