//! Risk-wired session driver.
//!
//! Sits between the scenarios and the gateway session: every outbound order
//! or cancel passes the risk monitor first, every inbound event updates the
//! monitor's counters and the driver's order caches. Scenarios never touch
//! the session directly.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gauntlet_core::{
    AccountSnapshot, CancelRequest, ContractSpec, OrderId, OrderRequest, OrderSnapshot,
    OrderStatus,
};
use gauntlet_risk::{CheckDecision, RiskMonitor};

use crate::adapter::{GatewaySession, SessionEvent};
use crate::error::SessionResult;

/// How many rejected orders are kept for inspection.
const REJECTED_STORE_CAP: usize = 50;

/// Outcome of a `place_order` call. A risk rejection is a value; only
/// transport failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Passed the risk gates and reached the gateway.
    Accepted(OrderId),
    /// Rejected locally by the risk monitor, never sent.
    Blocked(String),
}

impl Placement {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Outcome of a `cancel` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Cancel reached the gateway.
    Sent,
    /// Rejected locally, never sent.
    Blocked(String),
}

/// Orchestrating façade over a [`GatewaySession`].
pub struct SessionDriver {
    session: Arc<dyn GatewaySession>,
    monitor: Arc<RiskMonitor>,
    /// Latest snapshot per order id, session-wide.
    orders: DashMap<OrderId, OrderSnapshot>,
    /// Most recent gateway-rejected orders, newest last.
    rejected: Mutex<VecDeque<OrderSnapshot>>,
    /// Latest account margin picture.
    account: RwLock<Option<AccountSnapshot>>,
}

impl SessionDriver {
    #[must_use]
    pub fn new(session: Arc<dyn GatewaySession>, monitor: Arc<RiskMonitor>) -> Self {
        Self {
            session,
            monitor,
            orders: DashMap::new(),
            rejected: Mutex::new(VecDeque::new()),
            account: RwLock::new(None),
        }
    }

    pub fn connect(&self) -> SessionResult<()> {
        info!("connecting session");
        self.session.connect()
    }

    pub fn disconnect(&self) -> SessionResult<()> {
        info!("disconnecting session");
        self.session.disconnect()
    }

    pub fn reconnect(&self) -> SessionResult<()> {
        info!("reconnecting session");
        self.session.connect()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn subscribe(&self, symbol: &str) -> SessionResult<()> {
        self.session.subscribe(symbol)?;
        info!(symbol, "subscribed");
        Ok(())
    }

    /// Risk-check and send an order. On the allow path the returned id is
    /// registered with the monitor for session ownership tracking.
    pub fn place_order(&self, req: &OrderRequest) -> SessionResult<Placement> {
        match self.monitor.check_order(req) {
            CheckDecision::Reject(reason) => {
                warn!(symbol = %req.symbol, reason = %reason, "order blocked by risk monitor");
                Ok(Placement::Blocked(reason))
            }
            CheckDecision::Allow => {
                let id = self.session.send_order(req)?;
                self.monitor.register_order(id.clone());
                info!(
                    order_id = %id,
                    symbol = %req.symbol,
                    direction = %req.direction,
                    offset = %req.offset,
                    volume = req.volume,
                    price = req.price,
                    "order sent"
                );
                Ok(Placement::Accepted(id))
            }
        }
    }

    /// Risk-check and send a cancel. The cancel signature is registered only
    /// once the request is actually going out of the door.
    pub fn cancel(&self, req: &CancelRequest) -> SessionResult<CancelOutcome> {
        match self.monitor.check_cancel(req) {
            CheckDecision::Reject(reason) => {
                warn!(order_id = %req.order_id, reason = %reason, "cancel blocked by risk monitor");
                Ok(CancelOutcome::Blocked(reason))
            }
            CheckDecision::Allow => {
                self.monitor.register_cancel_request(req);
                self.session.cancel_order(req)?;
                info!(order_id = %req.order_id, "cancel sent");
                Ok(CancelOutcome::Sent)
            }
        }
    }

    /// Route one gateway event into the caches and the risk monitor.
    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Order(order) => self.handle_order(order),
            SessionEvent::Trade(fill) => {
                if self.monitor.owns_order(&fill.order_id) {
                    info!(
                        order_id = %fill.order_id,
                        price = fill.price,
                        volume = fill.volume,
                        "fill received"
                    );
                }
            }
            SessionEvent::Account(snapshot) => {
                *self.account.write() = Some(snapshot);
            }
            SessionEvent::Contract(contract) => {
                self.monitor.on_contract(contract);
            }
        }
    }

    fn handle_order(&self, order: OrderSnapshot) {
        self.orders.insert(order.order_id.clone(), order.clone());

        if self.monitor.owns_order(&order.order_id) {
            info!(order_id = %order.order_id, status = %order.status, "order update");
        }

        if order.reject_code.is_some() || order.status == OrderStatus::Rejected {
            self.record_rejection(&order);
        } else if order.status == OrderStatus::Cancelled {
            if let Some(reason) = order.reject_reason.as_deref() {
                debug!(order_id = %order.order_id, reason, "cancelled with status message");
            }
        }

        self.monitor.on_order_submitted(&order);
        if order.status == OrderStatus::Cancelled {
            self.monitor.on_order_cancelled(&order);
        }
    }

    fn record_rejection(&self, order: &OrderSnapshot) {
        {
            let mut store = self.rejected.lock();
            store.retain(|o| o.order_id != order.order_id);
            store.push_back(order.clone());
            while store.len() > REJECTED_STORE_CAP {
                store.pop_front();
            }
        }
        self.monitor.on_order_rejected(order);
    }

    /// Orders still working on the book.
    #[must_use]
    pub fn active_orders(&self) -> Vec<OrderSnapshot> {
        self.orders
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.value().clone())
            .collect()
    }

    #[must_use]
    pub fn order(&self, id: &OrderId) -> Option<OrderSnapshot> {
        self.orders.get(id).map(|entry| entry.value().clone())
    }

    /// Gateway-rejected orders, oldest first.
    #[must_use]
    pub fn rejected_orders(&self) -> Vec<OrderSnapshot> {
        self.rejected.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn account(&self) -> Option<AccountSnapshot> {
        self.account.read().clone()
    }

    /// Contract learned from the session, if any.
    #[must_use]
    pub fn contract(&self, symbol: &str) -> Option<ContractSpec> {
        self.monitor.contract(symbol)
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<RiskMonitor> {
        &self.monitor
    }
}

/// Drain the session event channel into the driver until shutdown or until
/// the session drops its sender.
pub fn spawn_event_pump(
    driver: Arc<SessionDriver>,
    mut events: UnboundedReceiver<SessionEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("event pump stopped");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => driver.handle_event(event),
                    None => {
                        debug!("event channel closed");
                        break;
                    }
                },
            }
        }
    })
}
