//! 2.1 gateway adaptability: login, open, close, cancel round trip.

use tracing::{info, warn};

use gauntlet_session::{CancelOutcome, Placement};

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::registry::Scenario;

/// 2.1.1: bring the session up and read back what the gateway pushed.
pub struct Connectivity;

impl Scenario for Connectivity {
    fn id(&self) -> &'static str {
        "2.1.1"
    }

    fn title(&self) -> &'static str {
        "connectivity and login"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        if ctx.driver().is_connected() {
            info!("session already up, checking login state");
        } else {
            info!("establishing session");
            ctx.driver().connect()?;
        }
        ctx.settle("connect and login callbacks");

        ctx.driver().subscribe(&ctx.params().test_symbol)?;
        ctx.settle("account snapshot");
        match ctx.driver().account() {
            Some(account) => info!(
                account_id = %account.account_id,
                balance = account.balance,
                available = account.available,
                "account funds"
            ),
            None => warn!("no account snapshot received"),
        }

        let active = ctx.driver().active_orders();
        info!(count = active.len(), "working orders");
        for order in &active {
            info!(order_id = %order.order_id, status = ?order.status, price = order.price, "working order");
        }
        Ok(())
    }
}

/// 2.1.2.1: a marketable buy opens a position.
pub struct OpenPosition;

impl Scenario for OpenPosition {
    fn id(&self) -> &'static str {
        "2.1.2.1"
    }

    fn title(&self) -> &'static str {
        "open position"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let swept = ctx.cancel_active_orders();
        if swept > 0 {
            info!(swept, "cleared resting orders before the drill");
            ctx.settle("cancel confirmations");
        }

        let req = ctx.open_order(ctx.params().deal_buy_price, "TestOpen");
        match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => {
                ctx.settle("fill confirmation");
                match ctx.driver().order(&order_id) {
                    Some(snap) => info!(
                        order_id = %order_id,
                        status = ?snap.status,
                        traded = snap.traded,
                        "open order settled"
                    ),
                    None => warn!(order_id = %order_id, "no order snapshot received"),
                }
            }
            Placement::Blocked(reason) => warn!(reason = %reason, "open order blocked locally"),
        }
        Ok(())
    }
}

/// 2.1.2.2: selling at a crossing price closes it again.
pub struct ClosePosition;

impl Scenario for ClosePosition {
    fn id(&self) -> &'static str {
        "2.1.2.2"
    }

    fn title(&self) -> &'static str {
        "close position"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let req = ctx.close_order(ctx.params().safe_buy_price, "TestClose");
        match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => {
                ctx.settle("close confirmation");
                match ctx.driver().order(&order_id) {
                    Some(snap) => info!(
                        order_id = %order_id,
                        status = ?snap.status,
                        reject_code = ?snap.reject_code,
                        "close order settled"
                    ),
                    None => warn!(order_id = %order_id, "no order snapshot received"),
                }
            }
            Placement::Blocked(reason) => warn!(reason = %reason, "close order blocked locally"),
        }
        Ok(())
    }
}

/// 2.1.2.3: rest an order far from the market, then take it down.
pub struct CancelRoundTrip;

impl Scenario for CancelRoundTrip {
    fn id(&self) -> &'static str {
        "2.1.2.3"
    }

    fn title(&self) -> &'static str {
        "cancel round trip"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let req = ctx.open_order(ctx.params().safe_buy_price, "TestCancel");
        let order_id = match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => order_id,
            Placement::Blocked(reason) => {
                warn!(reason = %reason, "resting order blocked locally");
                return Ok(());
            }
        };
        ctx.settle("resting confirmation");

        match ctx.driver().order(&order_id) {
            Some(snap) if snap.is_active() => {
                match ctx.driver().cancel(&snap.to_cancel_request())? {
                    CancelOutcome::Sent => {
                        ctx.settle("cancel confirmation");
                        if let Some(after) = ctx.driver().order(&order_id) {
                            info!(order_id = %order_id, status = ?after.status, "cancel settled");
                        }
                    }
                    CancelOutcome::Blocked(reason) => {
                        warn!(reason = %reason, "cancel blocked locally");
                    }
                }
            }
            Some(snap) => warn!(status = ?snap.status, "order not active, skipping cancel"),
            None => warn!(order_id = %order_id, "order snapshot missing"),
        }
        Ok(())
    }
}
