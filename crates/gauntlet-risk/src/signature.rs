//! Derived request signatures for duplicate-submission detection.
//!
//! Two requests with equal signatures are the same logical instruction
//! repeated. Signatures are derived on demand and only ever live as keys of
//! the monitor's occurrence maps.

use gauntlet_core::{CancelRequest, Direction, Exchange, Offset, OrderId, OrderKind, OrderRequest};

/// Price grid used to absorb float noise when comparing order prices.
/// One micro-unit matches the 1e-6 epsilon used by the tick check.
const PRICE_GRID: f64 = 1e6;

/// Identity of a logical order instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderSignature {
    symbol: String,
    direction: Direction,
    offset: Offset,
    kind: OrderKind,
    volume: u32,
    /// Price quantized to the micro grid.
    price_micros: i64,
}

impl OrderSignature {
    #[must_use]
    pub fn of(req: &OrderRequest) -> Self {
        Self {
            symbol: req.symbol.clone(),
            direction: req.direction,
            offset: req.offset,
            kind: req.kind,
            volume: req.volume,
            price_micros: quantize(req.price),
        }
    }
}

/// Identity of a logical cancel instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelSignature {
    order_id: OrderId,
    symbol: String,
    exchange: Exchange,
}

impl CancelSignature {
    #[must_use]
    pub fn of(req: &CancelRequest) -> Self {
        Self {
            order_id: req.order_id.clone(),
            symbol: req.symbol.clone(),
            exchange: req.exchange,
        }
    }
}

fn quantize(price: f64) -> i64 {
    (price * PRICE_GRID).round() as i64
}
