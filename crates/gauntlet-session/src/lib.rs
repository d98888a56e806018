//! Gateway session layer.
//!
//! [`GatewaySession`] abstracts the venue connection; [`SimGateway`] is the
//! loopback implementation used by the test harness. [`SessionDriver`] wraps
//! a session together with the risk monitor so every outgoing order and
//! cancel passes the local checks first, and folds the gateway's event
//! stream back into order state.

pub mod adapter;
pub mod driver;
pub mod error;
pub mod sim;

pub use adapter::{GatewaySession, MockSession, SessionEvent};
pub use driver::{spawn_event_pump, CancelOutcome, Placement, SessionDriver};
pub use error::{SessionError, SessionResult};
pub use sim::{SimConfig, SimGateway};
