use keel_core::Owner;
use keel_state::{CertificateStatus, StateError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate for {owner} already exists ({status})")]
    AlreadyExists {
        owner: Owner,
        status: CertificateStatus,
    },

    #[error("no certificate has been generated for {0}")]
    NotGenerated(Owner),

    #[error("cannot {action} certificate for {owner} while it is {from}")]
    InvalidTransition {
        owner: Owner,
        from: CertificateStatus,
        action: &'static str,
    },

    #[error("{owner} is not authorized to write: {reason}")]
    Unauthorized { owner: Owner, reason: String },

    #[error("invalid certificate config: {0}")]
    Config(String),

    #[error("certificate generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    State(#[from] StateError),
}
