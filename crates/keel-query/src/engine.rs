//! Query engine over registry snapshots.

use serde::{Deserialize, Serialize};
use tracing::debug;

use keel_core::Owner;
use keel_core::config::QueryConfig;
use keel_state::{CertificateRecord, DeploymentEntry, Group, PageParams, StateStore};

use crate::cursor::PageCursor;
use crate::error::QueryError;
use crate::filter::{CertificateFilters, DeploymentFilters, DeploymentIdParams, GroupIdParams};
use crate::page::{PageRequest, PageResponse};

/// Page-size bounds applied to every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for QueryLimits {
    fn from(config: &QueryConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}

/// One page of a deployment listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentsPage {
    pub deployments: Vec<DeploymentEntry>,
    pub pagination: PageResponse,
}

/// Read-only view of the registry.
#[derive(Clone)]
pub struct QueryEngine {
    store: StateStore,
    limits: QueryLimits,
}

impl QueryEngine {
    pub fn new(store: StateStore, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    /// List deployments matching `filters`, ordered by `(owner, dseq)`.
    ///
    /// No matches is an empty page, never an error.
    pub fn query_deployments(
        &self,
        filters: &DeploymentFilters,
        page: &PageRequest,
    ) -> Result<DeploymentsPage, QueryError> {
        let filter = filters.compile()?;
        page.validate()?;

        let cursor = page.key.as_deref().map(PageCursor::decode).transpose()?;
        if let Some(cursor) = &cursor {
            cursor.check_filter(filter.fingerprint())?;
        }

        let params = PageParams {
            after: cursor.as_ref().map(|c| c.last_key.clone()),
            offset: page.offset.unwrap_or(0),
            limit: page.effective_limit(self.limits.default_limit, self.limits.max_limit),
            // Totals are only meaningful over the whole range.
            count_total: page.count_total && cursor.is_none(),
            issued_at: cursor.as_ref().map(|c| c.version),
        };
        let listed = self
            .store
            .list_deployments(filter.scope(), |e| filter.matches(e), &params)?;

        debug!(
            scope = ?filter.scope(),
            returned = listed.entries.len(),
            more = listed.next_key.is_some(),
            "deployments listed"
        );

        // A continued listing keeps the version of its first page, so a
        // transition anywhere in the chain is detected.
        let version = cursor.as_ref().map_or(listed.version, |c| c.version);
        let next_key = listed.next_key.map(|last_key| {
            PageCursor {
                version,
                last_key,
                filter: filter.fingerprint().to_string(),
            }
            .encode()
        });

        Ok(DeploymentsPage {
            deployments: listed.entries,
            pagination: PageResponse {
                next_key,
                total: listed.total,
            },
        })
    }

    /// Exact deployment lookup.
    pub fn query_deployment(&self, id: &DeploymentIdParams) -> Result<DeploymentEntry, QueryError> {
        let id = id.resolve()?;
        debug!(%id, "deployment lookup");
        Ok(self.store.get_deployment(&id)?)
    }

    /// Exact group lookup. `NotFound` covers both a missing deployment and
    /// a gseq that is not among its groups.
    pub fn query_group(&self, id: &GroupIdParams) -> Result<Group, QueryError> {
        let id = id.resolve()?;
        debug!(%id, "group lookup");
        Ok(self.store.get_group(&id)?)
    }

    pub fn query_certificates(
        &self,
        filters: &CertificateFilters,
    ) -> Result<Vec<CertificateRecord>, QueryError> {
        let filter = filters.compile()?;
        let records = match filter.owner() {
            Some(owner) => self.store.get_certificate(owner)?.into_iter().collect(),
            None => self.store.list_certificates()?,
        };
        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    pub fn query_certificate(&self, owner: &str) -> Result<CertificateRecord, QueryError> {
        if owner.trim().is_empty() {
            return Err(QueryError::invalid("owner", "is required"));
        }
        let owner = Owner::parse(owner).map_err(|e| QueryError::invalid("owner", e))?;
        self.store
            .get_certificate(&owner)?
            .ok_or_else(|| QueryError::NotFound(format!("certificate of {owner}")))
    }

    /// Height of the last committed transition.
    pub fn height(&self) -> Result<u64, QueryError> {
        Ok(self.store.height()?)
    }
}
