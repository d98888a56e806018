//! Control protocol error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("peer closed without replying")]
    EmptyResponse,

    #[error("response was not a JSON envelope: {0}")]
    MalformedResponse(String),
}

pub type RpcResult<T> = Result<T, RpcError>;
