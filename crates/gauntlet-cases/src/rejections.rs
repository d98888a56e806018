//! 2.4 error injection: local validation blocks and gateway rejections.

use tracing::{info, warn};

use gauntlet_core::{Direction, Exchange, Offset, OrderId, OrderKind, OrderRequest};
use gauntlet_session::Placement;

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::registry::Scenario;

fn log_gateway_verdict(ctx: &CaseContext, order_id: &OrderId) {
    match ctx.driver().order(order_id) {
        Some(snap) => info!(
            order_id = %order_id,
            status = ?snap.status,
            reject_code = ?snap.reject_code,
            reject_reason = ?snap.reject_reason,
            "gateway verdict"
        ),
        None => warn!(order_id = %order_id, "no order snapshot received"),
    }
}

/// 2.4.1.1: a denylisted contract code must be blocked before the wire.
pub struct BadSymbol;

impl Scenario for BadSymbol {
    fn id(&self) -> &'static str {
        "2.4.1.1"
    }

    fn title(&self) -> &'static str {
        "invalid contract code"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let req = OrderRequest {
            symbol: "INVALID_CODE".to_string(),
            exchange: Exchange::Shfe,
            direction: Direction::Long,
            offset: Offset::Open,
            kind: OrderKind::Limit,
            volume: 1,
            price: 4000.0,
            reference: "BadSymbol".to_string(),
            volume_cap_exempt: false,
        };
        match ctx.driver().place_order(&req)? {
            Placement::Blocked(reason) => info!(reason = %reason, "bad symbol blocked locally"),
            Placement::Accepted(order_id) => {
                warn!(order_id = %order_id, "bad symbol passed the local checks");
            }
        }
        ctx.settle("error log review");
        Ok(())
    }
}

/// 2.4.1.2: a price off the contract's tick grid must be blocked.
pub struct BadTick;

impl Scenario for BadTick {
    fn id(&self) -> &'static str {
        "2.4.1.2"
    }

    fn title(&self) -> &'static str {
        "minimum price increment violation"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let spec = ctx.require_contract()?;

        // Nudge below any plausible tick.
        let req = ctx.open_order(ctx.params().safe_buy_price + 0.0001, "BadTick");
        match ctx.driver().place_order(&req)? {
            Placement::Blocked(reason) => {
                info!(tick = spec.price_tick, reason = %reason, "off-grid price blocked locally");
            }
            Placement::Accepted(order_id) => {
                warn!(order_id = %order_id, tick = spec.price_tick, "off-grid price passed the local checks");
            }
        }
        ctx.settle("error log review");
        Ok(())
    }
}

/// 2.4.1.3: volume over the local ceiling must be blocked.
pub struct OversizeVolume;

impl Scenario for OversizeVolume {
    fn id(&self) -> &'static str {
        "2.4.1.3"
    }

    fn title(&self) -> &'static str {
        "order volume over the ceiling"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let mut req = ctx.open_order(ctx.params().safe_buy_price, "OversizeVolume");
        req.volume = ctx.params().oversize_volume.max(1);
        match ctx.driver().place_order(&req)? {
            Placement::Blocked(reason) => {
                info!(volume = req.volume, reason = %reason, "oversize volume blocked locally");
            }
            Placement::Accepted(order_id) => {
                warn!(order_id = %order_id, volume = req.volume, "oversize volume passed the local checks");
            }
        }
        ctx.settle("error log review");
        Ok(())
    }
}

/// 2.4.2.1: the insufficient-funds rejection must come back from the
/// gateway, so the probe is exempted from the local volume ceiling.
pub struct InsufficientFunds;

impl Scenario for InsufficientFunds {
    fn id(&self) -> &'static str {
        "2.4.2.1"
    }

    fn title(&self) -> &'static str {
        "insufficient funds rejection"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let mut req = ctx.open_order(ctx.params().safe_buy_price, "FundTest");
        req.volume = ctx.params().fund_probe_volume;
        req.volume_cap_exempt = true;
        match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => {
                ctx.settle("funds rejection");
                log_gateway_verdict(ctx, &order_id);
            }
            Placement::Blocked(reason) => {
                warn!(reason = %reason, "probe blocked locally, gateway never saw it");
            }
        }
        Ok(())
    }
}

/// 2.4.2.2: closing with no position held must be rejected by the gateway.
pub struct PositionShortfall;

impl Scenario for PositionShortfall {
    fn id(&self) -> &'static str {
        "2.4.2.2"
    }

    fn title(&self) -> &'static str {
        "position shortfall rejection"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let req = ctx.close_order(ctx.params().safe_buy_price, "CloseEmpty");
        match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => {
                ctx.settle("position rejection");
                log_gateway_verdict(ctx, &order_id);
            }
            Placement::Blocked(reason) => {
                warn!(reason = %reason, "probe blocked locally, gateway never saw it");
            }
        }
        Ok(())
    }
}

/// 2.4.2.3: an order for a contract on a closed venue must draw a
/// market-state rejection.
pub struct MarketClosed;

impl Scenario for MarketClosed {
    fn id(&self) -> &'static str {
        "2.4.2.3"
    }

    fn title(&self) -> &'static str {
        "market state rejection"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let params = ctx.params();
        let req = OrderRequest {
            symbol: params.rest_test_symbol.clone(),
            exchange: params.rest_test_exchange,
            direction: Direction::Long,
            offset: Offset::Open,
            kind: OrderKind::Limit,
            volume: 1,
            price: params.rest_test_price,
            reference: "MarketErrTest".to_string(),
            volume_cap_exempt: false,
        };
        match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => {
                ctx.settle("market state rejection");
                log_gateway_verdict(ctx, &order_id);
            }
            Placement::Blocked(reason) => {
                warn!(reason = %reason, "probe blocked locally, gateway never saw it");
            }
        }
        Ok(())
    }
}
