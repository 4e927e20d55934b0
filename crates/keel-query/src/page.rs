//! Page requests and responses.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Paging options of a listing.
///
/// `key` (a cursor from a previous response) and `offset` are mutually
/// exclusive. A `limit` of zero or none means the configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub key: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub count_total: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    /// Cursor for the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key: Option<String>,
    /// Total matches, when `count_total` was requested on a first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

fn blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

impl PageRequest {
    /// Build a page request from raw wire fields.
    pub fn parse(
        key: Option<&str>,
        offset: Option<&str>,
        limit: Option<&str>,
        count_total: Option<&str>,
    ) -> Result<Self, QueryError> {
        let offset = blank(offset)
            .map(|s| s.parse::<u64>().map_err(|e| QueryError::invalid("pagination.offset", e)))
            .transpose()?;
        let limit = blank(limit)
            .map(|s| s.parse::<u64>().map_err(|e| QueryError::invalid("pagination.limit", e)))
            .transpose()?;
        let count_total = match blank(count_total) {
            None => false,
            Some(s) => s
                .parse::<bool>()
                .map_err(|e| QueryError::invalid("pagination.count_total", e))?,
        };
        Ok(Self {
            key: blank(key).map(str::to_string),
            offset,
            limit,
            count_total,
        })
    }

    /// Effective page size under the given bounds.
    pub fn effective_limit(&self, default_limit: u64, max_limit: u64) -> u64 {
        match self.limit {
            None | Some(0) => default_limit,
            Some(limit) => limit.min(max_limit),
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.key.is_some() && self.offset.is_some_and(|o| o > 0) {
            return Err(QueryError::InvalidFilter(
                "pagination: either offset or key is expected, got both".to_string(),
            ));
        }
        Ok(())
    }
}
