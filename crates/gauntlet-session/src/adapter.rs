//! Gateway session contract.
//!
//! The harness never talks to an exchange directly; everything goes through
//! this trait. Session calls are synchronous, gateway reactions come back
//! asynchronously as [`SessionEvent`]s on an unbounded channel, mirroring the
//! call/callback split of the real gateway APIs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use gauntlet_core::{
    AccountSnapshot, CancelRequest, ContractSpec, OrderId, OrderRequest, OrderSnapshot, TradeFill,
};

use crate::error::{SessionError, SessionResult};

/// An inbound gateway callback.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Order state change (submitted, filled, cancelled, rejected).
    Order(OrderSnapshot),
    /// A fill.
    Trade(TradeFill),
    /// Account margin update.
    Account(AccountSnapshot),
    /// Contract definition, pushed after login.
    Contract(ContractSpec),
}

/// A live connection to the external trading gateway.
///
/// Object-safe so the driver can hold `Arc<dyn GatewaySession>`; implementors
/// emit their callbacks on the event channel handed to them at construction.
pub trait GatewaySession: Send + Sync {
    /// Open the gateway connection with the settings the session was
    /// constructed with.
    fn connect(&self) -> SessionResult<()>;

    /// Tear the connection down. Resting orders survive on the venue.
    fn disconnect(&self) -> SessionResult<()>;

    fn is_connected(&self) -> bool;

    /// Submit an order, returning the gateway-assigned id. Acceptance here
    /// only means the request reached the gateway; a rejection may still
    /// arrive later as an order event.
    fn send_order(&self, req: &OrderRequest) -> SessionResult<OrderId>;

    fn cancel_order(&self, req: &CancelRequest) -> SessionResult<()>;

    /// Subscribe to market data for a symbol.
    fn subscribe(&self, symbol: &str) -> SessionResult<()>;
}

/// Recording session for tests.
///
/// Stores every send/cancel for verification and returns configurable
/// results. Emits no events of its own; tests feed the driver directly.
#[derive(Debug, Default)]
pub struct MockSession {
    connected: AtomicBool,
    next_order_seq: AtomicU64,
    sent_orders: parking_lot::Mutex<Vec<OrderRequest>>,
    sent_cancels: parking_lot::Mutex<Vec<CancelRequest>>,
    fail_next_send: parking_lot::Mutex<Option<String>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `send_order` fail with a gateway error.
    pub fn fail_next_send(&self, message: impl Into<String>) {
        *self.fail_next_send.lock() = Some(message.into());
    }

    pub fn sent_orders(&self) -> Vec<OrderRequest> {
        self.sent_orders.lock().clone()
    }

    pub fn sent_cancels(&self) -> Vec<CancelRequest> {
        self.sent_cancels.lock().clone()
    }
}

impl GatewaySession for MockSession {
    fn connect(&self) -> SessionResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> SessionResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_order(&self, req: &OrderRequest) -> SessionResult<OrderId> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        if let Some(message) = self.fail_next_send.lock().take() {
            return Err(SessionError::Gateway(message));
        }
        self.sent_orders.lock().push(req.clone());
        let seq = self.next_order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderId::new(format!("MOCK.{seq}")))
    }

    fn cancel_order(&self, req: &CancelRequest) -> SessionResult<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.sent_cancels.lock().push(req.clone());
        Ok(())
    }

    fn subscribe(&self, _symbol: &str) -> SessionResult<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }
}
