//! Core domain types for the gauntlet compliance harness.
//!
//! Shared by every other crate in the workspace:
//! - Order/cancel request types and their enums
//! - Gateway callback payloads (order state, fills, account, contract)

pub mod events;
pub mod order;

pub use events::{AccountSnapshot, ContractSpec, OrderSnapshot, TradeFill};
pub use order::{
    CancelRequest, Direction, Exchange, Offset, OrderId, OrderKind, OrderRequest, OrderStatus,
};
