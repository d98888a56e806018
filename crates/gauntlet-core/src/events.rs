//! Gateway callback payloads.
//!
//! The session layer turns raw gateway callbacks into these snapshots and
//! feeds them to the risk monitor and the case runner.

use crate::order::{CancelRequest, Direction, Exchange, Offset, OrderId, OrderKind, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub offset: Offset,
    pub kind: OrderKind,
    pub volume: u32,
    /// Volume filled so far.
    pub traded: u32,
    pub price: f64,
    pub status: OrderStatus,
    /// Gateway error code when `status` is `Rejected`.
    pub reject_code: Option<i32>,
    pub reject_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSnapshot {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Volume still working on the book.
    pub fn remaining(&self) -> u32 {
        self.volume.saturating_sub(self.traded)
    }

    /// Cancel request addressed at this order.
    #[must_use]
    pub fn to_cancel_request(&self) -> CancelRequest {
        CancelRequest {
            order_id: self.order_id.clone(),
            symbol: self.symbol.clone(),
            exchange: self.exchange,
        }
    }
}

/// A fill event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    pub order_id: OrderId,
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub offset: Offset,
    pub volume: u32,
    pub price: f64,
    pub traded_at: DateTime<Utc>,
}

/// Account margin snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub balance: f64,
    pub available: f64,
    pub frozen: f64,
}

/// Static contract definition pushed by the gateway after login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub symbol: String,
    pub exchange: Exchange,
    pub name: String,
    /// Minimum price increment. Orders must land on this grid.
    pub price_tick: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: OrderStatus, volume: u32, traded: u32) -> OrderSnapshot {
        OrderSnapshot {
            order_id: OrderId::new("sim.1"),
            symbol: "IF2601".to_string(),
            exchange: Exchange::Cffex,
            direction: Direction::Long,
            offset: Offset::Open,
            kind: OrderKind::Limit,
            volume,
            traded,
            price: 4000.0,
            status,
            reject_code: None,
            reject_reason: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_remaining_volume() {
        assert_eq!(snapshot(OrderStatus::PartFilled, 10, 4).remaining(), 6);
        assert_eq!(snapshot(OrderStatus::Filled, 10, 10).remaining(), 0);
    }

    #[test]
    fn test_remaining_never_underflows() {
        assert_eq!(snapshot(OrderStatus::Filled, 3, 5).remaining(), 0);
    }
}
