//! Control client.
//!
//! One connection per request: connect, write the envelope, half-close the
//! write side, read the reply line. Matches what the dashboard tooling has
//! always done, so old and new callers behave identically on the wire.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{RpcError, RpcResult};
use crate::protocol::{read_frame, ControlRequest, ControlResponse};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RpcClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl RpcClient {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_timeout(addr, DEFAULT_REQUEST_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends one JSON envelope and decodes the reply envelope. An
    /// `{ok:false}` reply is a successful call whose payload reports a
    /// remote failure; only transport problems surface as `Err`.
    pub async fn request(&self, kind: &str, payload: Value) -> RpcResult<ControlResponse> {
        let envelope = ControlRequest {
            request_id: Some(Uuid::new_v4().to_string()),
            kind: kind.to_string(),
            payload,
            timeout_ms: Some(self.timeout.as_millis() as u64),
        };
        let mut frame = serde_json::to_vec(&envelope)?;
        frame.push(b'\n');

        let raw = timeout(self.timeout, self.exchange(&frame))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))??;
        if raw.is_empty() {
            return Err(RpcError::EmptyResponse);
        }
        serde_json::from_slice(&raw).map_err(|_| {
            RpcError::MalformedResponse(String::from_utf8_lossy(&raw).into_owned())
        })
    }

    /// True when the server answered a `PING` with `ok`.
    pub async fn ping(&self) -> RpcResult<bool> {
        let response = self.request("PING", serde_json::json!({})).await?;
        Ok(response.ok)
    }

    /// Sends a bare legacy verb and returns the raw reply bytes as text.
    pub async fn legacy(&self, verb: &str) -> RpcResult<String> {
        let frame = format!("{verb}\n").into_bytes();
        let raw = timeout(self.timeout, self.exchange(&frame))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))??;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    async fn exchange(&self, frame: &[u8]) -> RpcResult<Vec<u8>> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.write_all(frame).await?;
        stream.shutdown().await?;
        Ok(read_frame(&mut stream).await?)
    }
}
