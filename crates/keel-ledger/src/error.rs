use keel_cert::CertError;
use keel_core::ValidationError;
use keel_state::StateError;
use thiserror::Error;

/// Why a transition was rejected. A rejected transition changes nothing.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Certificate(CertError),

    #[error(transparent)]
    State(StateError),
}

impl From<StateError> for TransitionError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(what) => TransitionError::NotFound(what),
            StateError::DuplicateKey(what) => TransitionError::DuplicateKey(what),
            other => TransitionError::State(other),
        }
    }
}

impl From<CertError> for TransitionError {
    fn from(e: CertError) -> Self {
        match e {
            CertError::Unauthorized { .. } => TransitionError::Unauthorized(e.to_string()),
            CertError::State(inner) => inner.into(),
            other => TransitionError::Certificate(other),
        }
    }
}

impl From<ValidationError> for TransitionError {
    fn from(e: ValidationError) -> Self {
        TransitionError::InvalidMessage(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),

    /// The transition was not finalized in time. It may still commit later.
    #[error("timed out waiting for finality")]
    Timeout,

    #[error("ledger writer has stopped")]
    Closed,

    #[error(transparent)]
    Storage(#[from] StateError),
}
