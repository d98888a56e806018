//! In-memory gateway used when no real venue is available.
//!
//! Implements just enough behavior for the compliance catalogue: orders
//! priced through the configured deal price fill immediately, everything
//! else rests until cancelled, and three error probes are answered with the
//! venue's error codes (16 market closed, 30 position shortfall, 31
//! insufficient funds). Rejections arrive asynchronously as order events,
//! the way a real gateway delivers them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use gauntlet_core::{
    AccountSnapshot, CancelRequest, ContractSpec, Exchange, OrderId, OrderRequest, OrderSnapshot,
    OrderStatus, TradeFill,
};

use crate::adapter::{GatewaySession, SessionEvent};
use crate::error::{SessionError, SessionResult};

pub const REJECT_MARKET_CLOSED: i32 = 16;
pub const REJECT_POSITION_SHORTFALL: i32 = 30;
pub const REJECT_INSUFFICIENT_FUNDS: i32 = 31;

/// Simulated venue parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// The one tradable contract.
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_exchange")]
    pub exchange: Exchange,
    #[serde(default = "default_price_tick")]
    pub price_tick: f64,
    /// Price the market currently trades at. Buys at or above it fill,
    /// sells at or below it fill, everything else rests.
    #[serde(default = "default_deal_price")]
    pub deal_price: f64,
    /// Account funds; orders with a larger notional are rejected.
    #[serde(default = "default_balance")]
    pub balance: f64,
    #[serde(default = "default_account_id")]
    pub account_id: String,
}

fn default_symbol() -> String {
    "IF2601".to_string()
}

fn default_exchange() -> Exchange {
    Exchange::Cffex
}

fn default_price_tick() -> f64 {
    0.2
}

fn default_deal_price() -> f64 {
    4660.0
}

fn default_balance() -> f64 {
    1_000_000.0
}

fn default_account_id() -> String {
    "sim-account".to_string()
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            exchange: default_exchange(),
            price_tick: default_price_tick(),
            deal_price: default_deal_price(),
            balance: default_balance(),
            account_id: default_account_id(),
        }
    }
}

impl SimConfig {
    #[must_use]
    pub fn contract(&self) -> ContractSpec {
        ContractSpec {
            symbol: self.symbol.clone(),
            exchange: self.exchange,
            name: self.symbol.clone(),
            price_tick: self.price_tick,
        }
    }
}

/// Loopback [`GatewaySession`].
pub struct SimGateway {
    config: SimConfig,
    events: UnboundedSender<SessionEvent>,
    connected: AtomicBool,
    next_seq: AtomicU64,
    /// Latest snapshot per order, including terminal states.
    book: DashMap<OrderId, OrderSnapshot>,
    /// Lots available to close. Close orders beyond it are rejected.
    position: AtomicU64,
}

impl SimGateway {
    #[must_use]
    pub fn new(config: SimConfig, events: UnboundedSender<SessionEvent>) -> Self {
        Self {
            config,
            events,
            connected: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            book: DashMap::new(),
            position: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SessionEvent) {
        // Receiver may already be gone during shutdown.
        let _ = self.events.send(event);
    }

    fn store_and_emit(&self, snapshot: OrderSnapshot) {
        self.book
            .insert(snapshot.order_id.clone(), snapshot.clone());
        self.emit(SessionEvent::Order(snapshot));
    }

    fn reject(&self, mut snapshot: OrderSnapshot, code: i32, reason: &str) {
        snapshot.status = OrderStatus::Rejected;
        snapshot.reject_code = Some(code);
        snapshot.reject_reason = Some(reason.to_string());
        snapshot.updated_at = Utc::now();
        self.store_and_emit(snapshot);
    }

    fn fill(&self, mut snapshot: OrderSnapshot, req: &OrderRequest) {
        match req.offset {
            gauntlet_core::Offset::Open => {
                self.position
                    .fetch_add(u64::from(req.volume), Ordering::SeqCst);
            }
            gauntlet_core::Offset::Close => {
                self.position
                    .fetch_sub(u64::from(req.volume), Ordering::SeqCst);
            }
        }

        snapshot.status = OrderStatus::Filled;
        snapshot.traded = req.volume;
        snapshot.updated_at = Utc::now();
        let order_id = snapshot.order_id.clone();
        self.store_and_emit(snapshot);
        self.emit(SessionEvent::Trade(TradeFill {
            order_id,
            symbol: req.symbol.clone(),
            exchange: req.exchange,
            direction: req.direction,
            offset: req.offset,
            volume: req.volume,
            price: self.config.deal_price,
            traded_at: Utc::now(),
        }));
    }

    fn crosses(&self, req: &OrderRequest) -> bool {
        match req.direction {
            gauntlet_core::Direction::Long => req.price >= self.config.deal_price,
            gauntlet_core::Direction::Short => req.price <= self.config.deal_price,
        }
    }
}

impl GatewaySession for SimGateway {
    /// Marks the session up and replays the login pushes: the contract
    /// definition and an account snapshot.
    fn connect(&self) -> SessionResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!(symbol = %self.config.symbol, "sim gateway connected");
        self.emit(SessionEvent::Contract(self.config.contract()));
        self.emit(SessionEvent::Account(AccountSnapshot {
            account_id: self.config.account_id.clone(),
            balance: self.config.balance,
            available: self.config.balance,
            frozen: 0.0,
        }));
        Ok(())
    }

    /// Drops the connection. Resting orders stay on the simulated venue,
    /// like they would on a real one.
    fn disconnect(&self) -> SessionResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!("sim gateway disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_order(&self, req: &OrderRequest) -> SessionResult<OrderId> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = OrderId::new(format!("SIM.{seq}"));
        let snapshot = OrderSnapshot {
            order_id: order_id.clone(),
            symbol: req.symbol.clone(),
            exchange: req.exchange,
            direction: req.direction,
            offset: req.offset,
            kind: req.kind,
            volume: req.volume,
            traded: 0,
            price: req.price,
            status: OrderStatus::Submitting,
            reject_code: None,
            reject_reason: None,
            updated_at: Utc::now(),
        };
        self.store_and_emit(snapshot.clone());

        if req.symbol != self.config.symbol {
            self.reject(snapshot, REJECT_MARKET_CLOSED, "market closed");
            return Ok(order_id);
        }
        if req.notional() > self.config.balance {
            self.reject(snapshot, REJECT_INSUFFICIENT_FUNDS, "insufficient funds");
            return Ok(order_id);
        }
        if req.offset == gauntlet_core::Offset::Close
            && u64::from(req.volume) > self.position.load(Ordering::SeqCst)
        {
            self.reject(snapshot, REJECT_POSITION_SHORTFALL, "position shortfall");
            return Ok(order_id);
        }

        if self.crosses(req) {
            self.fill(snapshot, req);
        } else {
            let mut resting = snapshot;
            resting.status = OrderStatus::Pending;
            resting.updated_at = Utc::now();
            self.store_and_emit(resting);
        }
        Ok(order_id)
    }

    fn cancel_order(&self, req: &CancelRequest) -> SessionResult<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let cancelled = {
            let Some(mut entry) = self.book.get_mut(&req.order_id) else {
                return Err(SessionError::UnknownOrder(req.order_id.clone()));
            };
            if !entry.status.is_active() {
                return Err(SessionError::OrderInactive(req.order_id.clone()));
            }
            entry.status = OrderStatus::Cancelled;
            entry.updated_at = Utc::now();
            entry.clone()
        };
        self.emit(SessionEvent::Order(cancelled));
        Ok(())
    }

    fn subscribe(&self, symbol: &str) -> SessionResult<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        debug!(symbol, "subscription acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{Direction, Offset, OrderKind};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn gateway() -> (SimGateway, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gw = SimGateway::new(SimConfig::default(), tx);
        gw.connect().unwrap();
        (gw, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn order(symbol: &str, direction: Direction, offset: Offset, volume: u32, price: f64) -> OrderRequest {
        OrderRequest {
            symbol: symbol.to_string(),
            exchange: Exchange::Cffex,
            direction,
            offset,
            kind: OrderKind::Limit,
            volume,
            price,
            reference: String::new(),
            volume_cap_exempt: false,
        }
    }

    fn last_order_status(events: &[SessionEvent]) -> Option<(OrderStatus, Option<i32>)> {
        events.iter().rev().find_map(|e| match e {
            SessionEvent::Order(o) => Some((o.status, o.reject_code)),
            _ => None,
        })
    }

    #[test]
    fn test_connect_replays_contract_and_account() {
        let (_gw, mut rx) = gateway();
        let events = drain(&mut rx);
        assert!(matches!(events[0], SessionEvent::Contract(_)));
        assert!(matches!(events[1], SessionEvent::Account(_)));
    }

    #[test]
    fn test_marketable_buy_fills_and_builds_position() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        gw.send_order(&order("IF2601", Direction::Long, Offset::Open, 2, 4660.0))
            .unwrap();
        let events = drain(&mut rx);

        assert_eq!(
            last_order_status(&events),
            Some((OrderStatus::Filled, None))
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Trade(f) if f.volume == 2)));
        assert_eq!(gw.position(), 2);
    }

    #[test]
    fn test_safe_priced_buy_rests_until_cancelled() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        let id = gw
            .send_order(&order("IF2601", Direction::Long, Offset::Open, 1, 4000.0))
            .unwrap();
        assert_eq!(
            last_order_status(&drain(&mut rx)),
            Some((OrderStatus::Pending, None))
        );

        gw.cancel_order(&CancelRequest {
            order_id: id,
            symbol: "IF2601".to_string(),
            exchange: Exchange::Cffex,
        })
        .unwrap();
        assert_eq!(
            last_order_status(&drain(&mut rx)),
            Some((OrderStatus::Cancelled, None))
        );
    }

    #[test]
    fn test_foreign_symbol_rejected_market_closed() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        gw.send_order(&order("LC2607", Direction::Long, Offset::Open, 1, 70000.0))
            .unwrap();
        assert_eq!(
            last_order_status(&drain(&mut rx)),
            Some((OrderStatus::Rejected, Some(REJECT_MARKET_CLOSED)))
        );
    }

    #[test]
    fn test_oversized_notional_rejected_insufficient_funds() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        gw.send_order(&order("IF2601", Direction::Long, Offset::Open, 50_000, 4000.0))
            .unwrap();
        assert_eq!(
            last_order_status(&drain(&mut rx)),
            Some((OrderStatus::Rejected, Some(REJECT_INSUFFICIENT_FUNDS)))
        );
    }

    #[test]
    fn test_close_without_position_rejected() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        gw.send_order(&order("IF2601", Direction::Short, Offset::Close, 1, 4000.0))
            .unwrap();
        assert_eq!(
            last_order_status(&drain(&mut rx)),
            Some((OrderStatus::Rejected, Some(REJECT_POSITION_SHORTFALL)))
        );
    }

    #[test]
    fn test_close_after_open_consumes_position() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        gw.send_order(&order("IF2601", Direction::Long, Offset::Open, 1, 4660.0))
            .unwrap();
        gw.send_order(&order("IF2601", Direction::Short, Offset::Close, 1, 4000.0))
            .unwrap();
        let events = drain(&mut rx);

        assert_eq!(
            last_order_status(&events),
            Some((OrderStatus::Filled, None))
        );
        assert_eq!(gw.position(), 0);
    }

    #[test]
    fn test_cancel_unknown_and_inactive_orders() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        let unknown = CancelRequest {
            order_id: OrderId::new("SIM.404"),
            symbol: "IF2601".to_string(),
            exchange: Exchange::Cffex,
        };
        assert!(matches!(
            gw.cancel_order(&unknown),
            Err(SessionError::UnknownOrder(_))
        ));

        let id = gw
            .send_order(&order("IF2601", Direction::Long, Offset::Open, 1, 4660.0))
            .unwrap();
        let filled = CancelRequest {
            order_id: id,
            symbol: "IF2601".to_string(),
            exchange: Exchange::Cffex,
        };
        assert!(matches!(
            gw.cancel_order(&filled),
            Err(SessionError::OrderInactive(_))
        ));
    }

    #[test]
    fn test_disconnected_gateway_refuses_everything() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);
        gw.disconnect().unwrap();

        assert!(matches!(
            gw.send_order(&order("IF2601", Direction::Long, Offset::Open, 1, 4660.0)),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(gw.subscribe("IF2601"), Err(SessionError::NotConnected)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_reconnect_replays_login_pushes() {
        let (gw, mut rx) = gateway();
        drain(&mut rx);

        gw.disconnect().unwrap();
        gw.connect().unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events[0], SessionEvent::Contract(_)));
    }
}
