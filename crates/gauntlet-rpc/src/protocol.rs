//! Wire format of the control port.
//!
//! Two frame shapes share one socket. New callers send a JSON envelope
//! terminated by a newline and get a JSON envelope back. Old control
//! scripts send a bare verb (`DISCONNECT`, `RECONNECT`, `PAUSE`) and get
//! the literal bytes `OK`, no newline. The server tells them apart by the
//! first non-space byte of the frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Hard cap on a single frame in either direction.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Reply sent to legacy callers. Exactly two bytes, no newline.
pub const LEGACY_OK: &[u8] = b"OK";

/// Verbs accepted on the legacy plaintext path.
pub const LEGACY_VERBS: [&str; 3] = ["DISCONNECT", "RECONNECT", "PAUSE"];

/// Request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    /// Dispatch key, matched case-insensitively.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    /// Advisory client deadline. The server does not enforce it.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Response envelope. `data` and `error` are mutually exclusive and
/// omitted entirely when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub request_id: Option<String>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    #[must_use]
    pub fn success(request_id: Option<String>, data: Option<Value>) -> Self {
        Self {
            request_id,
            ok: true,
            data,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(request_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            request_id,
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Reads one frame: everything up to the first newline, the peer's write
/// shutdown, or [`MAX_FRAME_BYTES`], whichever comes first. The newline is
/// not included.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut frame = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if let Some(at) = chunk[..n].iter().position(|&b| b == b'\n') {
            frame.extend_from_slice(&chunk[..at]);
            break;
        }
        frame.extend_from_slice(&chunk[..n]);
        if frame.len() >= MAX_FRAME_BYTES {
            frame.truncate(MAX_FRAME_BYTES);
            break;
        }
    }
    Ok(frame)
}
