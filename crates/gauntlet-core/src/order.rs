//! Order and cancel request types.
//!
//! These mirror the request objects the external gateway session consumes.
//! The harness never interprets them beyond risk checking; they are passed
//! through to the session as-is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Position effect of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Offset {
    /// Opens new exposure.
    Open,
    /// Closes existing exposure.
    Close,
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Limit order (the only kind the compliance catalogue exercises).
    Limit,
    /// Market order.
    Market,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// Exchange a contract trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Shfe,
    Cffex,
    Dce,
    Czce,
    Gfex,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shfe => write!(f, "SHFE"),
            Self::Cffex => write!(f, "CFFEX"),
            Self::Dce => write!(f, "DCE"),
            Self::Czce => write!(f, "CZCE"),
            Self::Gfex => write!(f, "GFEX"),
        }
    }
}

/// Gateway-assigned order identifier.
///
/// Opaque to the harness; only equality matters (session ownership tracking
/// and cancel routing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of an order as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Sent, not yet acknowledged.
    Submitting,
    /// Resting on the book, nothing filled.
    Pending,
    /// Partially filled, remainder still live.
    PartFilled,
    /// Fully filled.
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// True while the order can still trade or be cancelled.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Pending | Self::PartFilled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitting => write!(f, "submitting"),
            Self::Pending => write!(f, "pending"),
            Self::PartFilled => write!(f, "part_filled"),
            Self::Filled => write!(f, "filled"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A new-order instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub offset: Offset,
    pub kind: OrderKind,
    pub volume: u32,
    pub price: f64,
    /// Free-form tag identifying the originating test step.
    #[serde(default)]
    pub reference: String,
    /// Deliberately oversized probes set this to reach the gateway instead
    /// of being stopped by the local volume ceiling.
    #[serde(default)]
    pub volume_cap_exempt: bool,
}

impl OrderRequest {
    /// Notional value at the requested price.
    pub fn notional(&self) -> f64 {
        f64::from(self.volume) * self.price
    }
}

/// A cancel instruction for a previously sent order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancelRequest {
    pub order_id: OrderId,
    pub symbol: String,
    pub exchange: Exchange,
}
