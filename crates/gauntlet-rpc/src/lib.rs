//! Loopback control plane shared by the worker and the conductor.
//!
//! The worker exposes an [`RpcServer`] on a fixed local port; the conductor
//! and dashboard tooling drive it through [`RpcClient`]. The wire protocol
//! lives in [`protocol`]: newline-framed JSON envelopes, with a plaintext
//! fallback for the original three-verb control scripts.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{RpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{RpcError, RpcResult};
pub use protocol::{ControlRequest, ControlResponse, LEGACY_OK, LEGACY_VERBS, MAX_FRAME_BYTES};
pub use server::{ControlHandler, RpcServer};
