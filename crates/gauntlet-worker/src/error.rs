//! Worker error types.

use thiserror::Error;

use gauntlet_rpc::RpcError;
use gauntlet_session::SessionError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("control server error: {0}")]
    Rpc(#[from] RpcError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
