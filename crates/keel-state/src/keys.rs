//! Composite key encoding.
//!
//! Sequence numbers are zero-padded to their full decimal width, and owner
//! addresses never contain `/` (identity resolution rejects it), so byte
//! order of the encoded keys equals ascending `(owner, dseq, gseq)` order.

use keel_core::{DeploymentId, GroupId, Owner};

/// Range of deployment keys a listing has to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScope {
    /// Every deployment.
    All,
    /// Deployments of a single owner.
    Owner(Owner),
    /// One exact deployment.
    Exact(DeploymentId),
}

pub fn deployment_key(id: &DeploymentId) -> String {
    format!("{}/{:020}", id.owner, id.dseq)
}

pub fn group_key(id: &GroupId) -> String {
    format!("{}/{:020}/{:010}", id.owner, id.dseq, id.gseq)
}

/// Prefix shared by all groups of a deployment.
pub fn group_prefix(id: &DeploymentId) -> String {
    format!("{}/", deployment_key(id))
}

/// Prefix shared by all deployments of an owner.
pub fn owner_prefix(owner: &Owner) -> String {
    format!("{owner}/")
}
