//! 2.2 anomaly monitoring: link state, submission statistics, repeats.

use gauntlet_core::Offset;
use tracing::{info, warn};

use gauntlet_session::Placement;

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::registry::Scenario;

/// 2.2.1.1: report whether the session is currently connected.
pub struct ConnectionStatus;

impl Scenario for ConnectionStatus {
    fn id(&self) -> &'static str {
        "2.2.1.1"
    }

    fn title(&self) -> &'static str {
        "connection status"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        if ctx.driver().is_connected() {
            info!("session connected, live state confirmed by gateway callbacks");
        } else {
            warn!("session not connected");
        }
        Ok(())
    }
}

/// 2.2.1.2 / 2.2.1.3: markers for the forced disconnect and reconnect
/// drills. The process-level kill and resurrection are driven from the
/// conductor; these cases only fence the observation window in the log.
pub struct LinkProbe {
    id: &'static str,
    title: &'static str,
    note: &'static str,
}

impl LinkProbe {
    pub const DISCONNECT: Self = Self {
        id: "2.2.1.2",
        title: "forced disconnect probe",
        note: "disconnect is injected by the conductor's hard-disconnect drill",
    };

    pub const RECONNECT: Self = Self {
        id: "2.2.1.3",
        title: "forced reconnect probe",
        note: "reconnect is injected by the conductor's hard-reconnect drill",
    };
}

impl Scenario for LinkProbe {
    fn id(&self) -> &'static str {
        self.id
    }

    fn title(&self) -> &'static str {
        self.title
    }

    fn run(&self, _ctx: &CaseContext) -> CaseResult<()> {
        info!("{}", self.note);
        Ok(())
    }
}

/// 2.2.2.1: every accepted submission must advance the order counter by
/// exactly one.
pub struct OrderCounting;

impl Scenario for OrderCounting {
    fn id(&self) -> &'static str {
        "2.2.2.1"
    }

    fn title(&self) -> &'static str {
        "order statistics"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        const PROBES: u64 = 3;

        ctx.require_contract()?;
        let start = ctx.monitor().metrics().order_count;

        let mut placed = 0u64;
        for _ in 0..PROBES {
            let req = ctx.open_order(ctx.params().safe_buy_price, "CountProbe");
            match ctx.driver().place_order(&req)? {
                Placement::Accepted(_) => placed += 1,
                Placement::Blocked(reason) => warn!(reason = %reason, "probe order blocked"),
            }
        }
        ctx.settle("order statistics");

        let counted = ctx.monitor().metrics().order_count - start;
        if counted == placed {
            info!(placed, counted, "order statistics accurate");
        } else {
            warn!(placed, counted, "order statistics out of step");
        }
        Ok(())
    }
}

/// 2.2.2.2: every cancel that clears the local checks must advance the
/// cancel counter by exactly one.
pub struct CancelCounting;

impl Scenario for CancelCounting {
    fn id(&self) -> &'static str {
        "2.2.2.2"
    }

    fn title(&self) -> &'static str {
        "cancel statistics"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        const PROBES: usize = 2;

        ctx.require_contract()?;

        let mut staged = Vec::with_capacity(PROBES);
        for _ in 0..PROBES {
            let req = ctx.open_order(ctx.params().safe_buy_price, "CancelCount");
            if let Placement::Accepted(id) = ctx.driver().place_order(&req)? {
                staged.push(id);
            }
        }
        ctx.settle("staged orders to rest");

        let start = ctx.monitor().metrics().cancel_count;
        let mut sent = 0u64;
        for id in &staged {
            let Some(snap) = ctx.driver().order(id) else {
                continue;
            };
            if !snap.is_active() {
                continue;
            }
            if let gauntlet_session::CancelOutcome::Sent =
                ctx.driver().cancel(&snap.to_cancel_request())?
            {
                sent += 1;
            }
        }
        ctx.settle("cancel statistics");

        let counted = ctx.monitor().metrics().cancel_count - start;
        if counted == sent {
            info!(sent, counted, "cancel statistics accurate");
        } else {
            warn!(sent, counted, "cancel statistics out of step");
        }
        Ok(())
    }
}

/// 2.2.3.1 / 2.2.3.2: fire a burst of byte-identical submissions and watch
/// the repeat bookkeeping. The open variant also rests one order at a
/// distinct price to prove distinct signatures stay unmerged.
pub struct RepeatOrders {
    id: &'static str,
    title: &'static str,
    offset: Offset,
}

impl RepeatOrders {
    pub const OPEN: Self = Self {
        id: "2.2.3.1",
        title: "repeated opening orders",
        offset: Offset::Open,
    };

    pub const CLOSE: Self = Self {
        id: "2.2.3.2",
        title: "repeated closing orders",
        offset: Offset::Close,
    };
}

impl Scenario for RepeatOrders {
    fn id(&self) -> &'static str {
        self.id
    }

    fn title(&self) -> &'static str {
        self.title
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let burst = ctx.monitor().thresholds().max_repeat_count.max(1);
        match self.offset {
            Offset::Open => {
                info!(burst, "sending identical opening orders at the dealing price");
                for _ in 0..burst {
                    let req = ctx.open_order(ctx.params().deal_buy_price, "RepeatOpen");
                    ctx.driver().place_order(&req)?;
                }
                // One more at a different price: new signature, no repeat.
                let req = ctx.open_order(ctx.params().safe_buy_price, "RepeatOpen");
                ctx.driver().place_order(&req)?;
            }
            Offset::Close => {
                info!(burst, "sending identical closing orders");
                for _ in 0..burst {
                    let req = ctx.close_order(ctx.params().safe_buy_price, "RepeatClose");
                    ctx.driver().place_order(&req)?;
                }
            }
        }
        ctx.settle("repeat bookkeeping");

        let metrics = ctx.monitor().metrics();
        info!(
            repeat_order_count = metrics.repeat_order_count,
            warned = metrics.warned_repeat,
            "repeat submission metrics"
        );
        Ok(())
    }
}

/// 2.2.3.3: cancel the same order twice. The venue refuses the duplicate
/// but the monitor must still count the repeated request.
pub struct RepeatCancel;

impl Scenario for RepeatCancel {
    fn id(&self) -> &'static str {
        "2.2.3.3"
    }

    fn title(&self) -> &'static str {
        "repeated cancel requests"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        ctx.require_contract()?;

        let req = ctx.open_order(ctx.params().safe_buy_price, "RepeatCancel");
        let order_id = match ctx.driver().place_order(&req)? {
            Placement::Accepted(order_id) => order_id,
            Placement::Blocked(reason) => {
                warn!(reason = %reason, "staging order blocked, nothing to cancel");
                return Ok(());
            }
        };
        ctx.settle("resting confirmation");

        let Some(snap) = ctx.driver().order(&order_id) else {
            warn!(order_id = %order_id, "order snapshot missing");
            return Ok(());
        };
        let cancel = snap.to_cancel_request();

        ctx.driver().cancel(&cancel)?;
        ctx.settle("first cancel confirmation");

        match ctx.driver().cancel(&cancel) {
            Ok(_) => info!("duplicate cancel sent"),
            Err(e) => info!(error = %e, "duplicate cancel refused by venue, request still counted"),
        }
        ctx.settle("repeat bookkeeping");

        let metrics = ctx.monitor().metrics();
        info!(
            repeat_cancel_count = metrics.repeat_cancel_count,
            warned = metrics.warned_repeat,
            "repeat cancel metrics"
        );
        Ok(())
    }
}
