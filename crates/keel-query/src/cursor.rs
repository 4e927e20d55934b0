//! Opaque pagination cursors.
//!
//! A cursor records where the previous page stopped, the registry version
//! it was read at, and the fingerprint of the filter that produced it. It
//! travels as hex-encoded JSON.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Registry version of the snapshot that issued the cursor.
    pub version: u64,
    /// Deployment key of the last entry returned.
    pub last_key: String,
    /// Fingerprint of the compiled filter.
    pub filter: String,
}

impl PageCursor {
    pub fn encode(&self) -> String {
        // A struct of a number and two strings always serializes.
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(raw: &str) -> Result<Self, QueryError> {
        let bytes = hex::decode(raw.trim())
            .map_err(|e| QueryError::invalid("pagination.key", e))?;
        serde_json::from_slice(&bytes).map_err(|e| QueryError::invalid("pagination.key", e))
    }

    /// Reject a cursor presented with a different filter than it was issued for.
    pub fn check_filter(&self, fingerprint: &str) -> Result<(), QueryError> {
        if self.filter == fingerprint {
            Ok(())
        } else {
            Err(QueryError::invalid(
                "pagination.key",
                "cursor was issued for a different filter",
            ))
        }
    }
}
