//! Scenario error types.

use gauntlet_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaseError {
    /// The contract definition never arrived from the gateway.
    #[error("contract {0} not available")]
    MissingContract(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type CaseResult<T> = Result<T, CaseError>;
