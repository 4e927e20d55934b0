//! Filter evaluator.
//!
//! Turns partial filter input into a [`CompiledFilter`]: a pure, reusable
//! predicate over deployment entries plus the narrowest key scope the
//! registry can use. All structural validation happens here, so a query
//! that reaches storage is well-formed.
//!
//! Composite keys must be specified outer-to-inner: `gseq` needs `dseq`,
//! and `dseq` needs `owner`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use keel_core::{DeploymentId, DeploymentState, GroupId, Owner};
use keel_state::{CertificateRecord, CertificateStatus, DeploymentEntry, KeyScope};

use crate::error::QueryError;

/// Treat absent and blank fields alike.
fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_owner(field: &str, raw: &str) -> Result<Owner, QueryError> {
    Owner::parse(raw).map_err(|e| QueryError::invalid(field, e))
}

fn parse_dseq(field: &str, raw: &str) -> Result<u64, QueryError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(QueryError::invalid(field, "must be positive")),
        Ok(dseq) => Ok(dseq),
        Err(e) => Err(QueryError::invalid(field, e)),
    }
}

fn parse_gseq(field: &str, raw: &str) -> Result<u32, QueryError> {
    match raw.parse::<u32>() {
        Ok(0) => Err(QueryError::invalid(field, "must be positive")),
        Ok(gseq) => Ok(gseq),
        Err(e) => Err(QueryError::invalid(field, e)),
    }
}

fn parse_state(field: &str, raw: &str) -> Result<DeploymentState, QueryError> {
    match raw.parse::<DeploymentState>() {
        Ok(state) if state.is_sentinel() => {
            Err(QueryError::invalid(field, format!("{raw:?} is not a valid state")))
        }
        Ok(state) => Ok(state),
        Err(e) => Err(QueryError::invalid(field, e)),
    }
}

// ── Deployment listing ─────────────────────────────────────────────

/// Partial filter for deployment listings, as received on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFilters {
    pub owner: Option<String>,
    pub dseq: Option<String>,
    pub gseq: Option<String>,
    pub state: Option<String>,
}

impl DeploymentFilters {
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn dseq(mut self, dseq: impl ToString) -> Self {
        self.dseq = Some(dseq.to_string());
        self
    }

    pub fn gseq(mut self, gseq: impl ToString) -> Self {
        self.gseq = Some(gseq.to_string());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Validate and compile into a predicate.
    pub fn compile(&self) -> Result<CompiledFilter, QueryError> {
        let state = present(&self.state)
            .map(|raw| parse_state("filters.state", raw))
            .transpose()?;
        let owner = present(&self.owner)
            .map(|raw| parse_owner("filters.owner", raw))
            .transpose()?;
        let dseq = present(&self.dseq)
            .map(|raw| parse_dseq("filters.dseq", raw))
            .transpose()?;
        let gseq = present(&self.gseq)
            .map(|raw| parse_gseq("filters.gseq", raw))
            .transpose()?;

        if gseq.is_some() && dseq.is_none() {
            return Err(QueryError::invalid("filters.gseq", "requires filters.dseq"));
        }
        if dseq.is_some() && owner.is_none() {
            return Err(QueryError::invalid("filters.dseq", "requires filters.owner"));
        }

        Ok(CompiledFilter::new(owner, dseq, gseq, state))
    }
}

/// A validated deployment filter.
///
/// Cheap to clone; the predicate is shared and free of side effects, so one
/// compiled filter can drive any number of scans.
#[derive(Clone)]
pub struct CompiledFilter {
    scope: KeyScope,
    fingerprint: String,
    predicate: Arc<dyn Fn(&DeploymentEntry) -> bool + Send + Sync>,
}

impl CompiledFilter {
    fn new(
        owner: Option<Owner>,
        dseq: Option<u64>,
        gseq: Option<u32>,
        state: Option<DeploymentState>,
    ) -> Self {
        let scope = match (&owner, dseq) {
            (Some(owner), Some(dseq)) => KeyScope::Exact(DeploymentId::new(owner.clone(), dseq)),
            (Some(owner), None) => KeyScope::Owner(owner.clone()),
            _ => KeyScope::All,
        };

        let canonical = format!(
            "owner={};dseq={};gseq={};state={}",
            owner.as_ref().map(Owner::as_str).unwrap_or(""),
            dseq.map(|d| d.to_string()).unwrap_or_default(),
            gseq.map(|g| g.to_string()).unwrap_or_default(),
            state.map(|s| s.as_str()).unwrap_or(""),
        );
        let fingerprint = hex::encode(&Sha256::digest(canonical.as_bytes())[..8]);

        let predicate = move |entry: &DeploymentEntry| {
            let id = entry.id();
            owner.as_ref().is_none_or(|o| &id.owner == o)
                && dseq.is_none_or(|d| id.dseq == d)
                && gseq.is_none_or(|g| entry.group(g).is_some())
                && state.is_none_or(|s| entry.deployment.state == s)
        };

        Self {
            scope,
            fingerprint,
            predicate: Arc::new(predicate),
        }
    }

    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    /// Stable identity of the filter, used to bind cursors to it.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn matches(&self, entry: &DeploymentEntry) -> bool {
        (self.predicate)(entry)
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("scope", &self.scope)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

// ── Singleton lookups ──────────────────────────────────────────────

/// Identifying fields of a single-deployment lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentIdParams {
    pub owner: Option<String>,
    pub dseq: Option<String>,
}

impl DeploymentIdParams {
    pub fn new(owner: impl Into<String>, dseq: impl ToString) -> Self {
        Self {
            owner: Some(owner.into()),
            dseq: Some(dseq.to_string()),
        }
    }

    /// Resolve to an exact deployment id; every component is required.
    pub fn resolve(&self) -> Result<DeploymentId, QueryError> {
        let (owner, dseq) = (present(&self.owner), present(&self.dseq));
        if owner.is_none() && dseq.is_none() {
            return Err(QueryError::InvalidFilter(
                "deployment lookup needs id.owner and id.dseq".to_string(),
            ));
        }
        let owner = owner.ok_or_else(|| QueryError::invalid("id.owner", "is required"))?;
        let dseq = dseq.ok_or_else(|| QueryError::invalid("id.dseq", "is required"))?;
        Ok(DeploymentId::new(
            parse_owner("id.owner", owner)?,
            parse_dseq("id.dseq", dseq)?,
        ))
    }
}

/// Identifying fields of a single-group lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIdParams {
    pub owner: Option<String>,
    pub dseq: Option<String>,
    pub gseq: Option<String>,
}

impl GroupIdParams {
    pub fn new(owner: impl Into<String>, dseq: impl ToString, gseq: impl ToString) -> Self {
        Self {
            owner: Some(owner.into()),
            dseq: Some(dseq.to_string()),
            gseq: Some(gseq.to_string()),
        }
    }

    /// Resolve to an exact group id; every component is required.
    pub fn resolve(&self) -> Result<GroupId, QueryError> {
        let gseq = present(&self.gseq);
        if present(&self.owner).is_none() && present(&self.dseq).is_none() && gseq.is_none() {
            return Err(QueryError::InvalidFilter(
                "group lookup needs id.owner, id.dseq and id.gseq".to_string(),
            ));
        }
        if gseq.is_some() && present(&self.dseq).is_none() {
            return Err(QueryError::invalid("id.gseq", "requires id.dseq"));
        }
        let deployment = DeploymentIdParams {
            owner: self.owner.clone(),
            dseq: self.dseq.clone(),
        }
        .resolve()?;
        let gseq = gseq.ok_or_else(|| QueryError::invalid("id.gseq", "is required"))?;
        Ok(deployment.group(parse_gseq("id.gseq", gseq)?))
    }
}

// ── Certificates ───────────────────────────────────────────────────

/// Partial filter for certificate listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFilters {
    pub owner: Option<String>,
    pub state: Option<String>,
}

/// A validated certificate filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCertificateFilter {
    owner: Option<Owner>,
    status: Option<CertificateStatus>,
}

impl CertificateFilters {
    pub fn compile(&self) -> Result<CompiledCertificateFilter, QueryError> {
        let owner = present(&self.owner)
            .map(|raw| parse_owner("filter.owner", raw))
            .transpose()?;
        let status = present(&self.state)
            .map(|raw| {
                raw.parse::<CertificateStatus>()
                    .map_err(|e| QueryError::invalid("filter.state", e))
            })
            .transpose()?;
        Ok(CompiledCertificateFilter { owner, status })
    }
}

impl CompiledCertificateFilter {
    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn matches(&self, record: &CertificateRecord) -> bool {
        self.owner.as_ref().is_none_or(|o| &record.owner == o)
            && self.status.is_none_or(|s| record.status == s)
    }
}
