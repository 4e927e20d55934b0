use keel_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed or under-specified query input, detected before storage access.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The registry changed since the cursor was issued; restart paging.
    #[error("stale cursor: {0}")]
    StaleCursor(String),

    #[error(transparent)]
    State(StateError),
}

impl QueryError {
    pub(crate) fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        QueryError::InvalidFilter(format!("{field}: {reason}"))
    }
}

impl From<StateError> for QueryError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(what) => QueryError::NotFound(what),
            e @ StateError::StaleCursor { .. } => QueryError::StaleCursor(e.to_string()),
            other => QueryError::State(other),
        }
    }
}
