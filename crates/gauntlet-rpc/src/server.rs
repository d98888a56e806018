//! Control server.
//!
//! Listens on a loopback TCP port and serves one connection at a time;
//! concurrent callers queue in the listen backlog. Every frame is answered
//! and every failure is converted into an error reply or a log line, so the
//! accept loop survives anything a client sends.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RpcResult;
use crate::protocol::{
    read_frame, ControlRequest, ControlResponse, LEGACY_OK, LEGACY_VERBS,
};

/// How long a connected client may take to deliver its frame.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatch target for decoded requests.
///
/// `kind` arrives uppercased. Returning `Err` produces an
/// `{ok:false,error:..}` envelope (or a log line on the legacy path); it
/// never tears down the server.
pub trait ControlHandler: Send + Sync {
    fn handle(&self, kind: &str, payload: &Value) -> Result<Option<Value>, String>;
}

pub struct RpcServer {
    listener: TcpListener,
    handler: Arc<dyn ControlHandler>,
    shutdown: CancellationToken,
}

impl RpcServer {
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<dyn ControlHandler>,
        shutdown: CancellationToken,
    ) -> RpcResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "control server listening");
        Ok(Self {
            listener,
            handler,
            shutdown,
        })
    }

    /// Actual bound address, useful when binding port 0.
    pub fn local_addr(&self) -> RpcResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the shutdown token fires.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = self.serve_connection(stream).await {
                            warn!(peer = %peer, error = %e, "control connection failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "control accept failed"),
                },
            }
        }
        info!("control server stopped");
    }

    async fn serve_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let frame = timeout(REQUEST_READ_TIMEOUT, read_frame(&mut stream))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "request read timed out")
            })??;
        if let Some(reply) = self.dispatch(&frame) {
            stream.write_all(&reply).await?;
        }
        stream.shutdown().await?;
        Ok(())
    }

    /// Frame sniffer. A `{` first byte means the JSON envelope protocol,
    /// anything else is treated as a legacy verb. Blank frames are dropped
    /// without a reply.
    fn dispatch(&self, frame: &[u8]) -> Option<Vec<u8>> {
        match frame.iter().find(|b| !b.is_ascii_whitespace()) {
            None => None,
            Some(b'{') => Some(self.dispatch_json(frame)),
            Some(_) => Some(self.dispatch_legacy(frame)),
        }
    }

    fn dispatch_json(&self, frame: &[u8]) -> Vec<u8> {
        let response = match serde_json::from_slice::<ControlRequest>(frame) {
            Ok(req) => {
                let kind = req.kind.to_uppercase();
                debug!(kind = %kind, "control request");
                match self.handler.handle(&kind, &req.payload) {
                    Ok(data) => ControlResponse::success(req.request_id, data),
                    Err(error) => ControlResponse::failure(req.request_id, error),
                }
            }
            Err(e) => ControlResponse::failure(None, format!("invalid_request: {e}")),
        };
        let mut reply = serde_json::to_vec(&response)
            .unwrap_or_else(|_| br#"{"request_id":null,"ok":false,"error":"encode_failure"}"#.to_vec());
        reply.push(b'\n');
        reply
    }

    fn dispatch_legacy(&self, frame: &[u8]) -> Vec<u8> {
        let verb = String::from_utf8_lossy(frame).trim().to_uppercase();
        info!(verb = %verb, "legacy control command");
        if LEGACY_VERBS.contains(&verb.as_str()) {
            if let Err(error) = self.handler.handle(&verb, &Value::Null) {
                warn!(verb = %verb, error = %error, "legacy command failed");
            }
        } else {
            warn!(verb = %verb, "unknown legacy command");
        }
        LEGACY_OK.to_vec()
    }
}
