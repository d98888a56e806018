//! Session error types.

use gauntlet_core::OrderId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not connected")]
    NotConnected,

    #[error("unknown order id: {0}")]
    UnknownOrder(OrderId),

    #[error("order {0} is no longer active")]
    OrderInactive(OrderId),

    #[error("gateway error: {0}")]
    Gateway(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
