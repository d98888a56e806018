//! Conductor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("control channel error: {0}")]
    Rpc(#[from] gauntlet_rpc::RpcError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] gauntlet_supervisor::SupervisorError),
}

pub type ConductorResult<T> = Result<T, ConductorError>;
