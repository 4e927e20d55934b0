//! Shared types used across Keel crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::identity::Owner;

/// Maximum number of groups a single deployment may carry.
pub const MAX_GROUPS_PER_DEPLOYMENT: usize = 20;

/// Maximum replica count for one resource unit.
pub const MAX_UNIT_COUNT: u32 = 1000;

/// Maximum length of a group name.
pub const MAX_GROUP_NAME_LEN: usize = 128;

// ── Identifiers ───────────────────────────────────────────────────

/// Composite deployment key: owner plus owner-scoped sequence number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeploymentId {
    pub owner: Owner,
    pub dseq: u64,
}

/// Composite group key: the owning deployment plus a deployment-scoped sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId {
    pub owner: Owner,
    pub dseq: u64,
    pub gseq: u32,
}

impl DeploymentId {
    pub fn new(owner: Owner, dseq: u64) -> Self {
        Self { owner, dseq }
    }

    /// Id of the `gseq`-th group of this deployment.
    pub fn group(&self, gseq: u32) -> GroupId {
        GroupId {
            owner: self.owner.clone(),
            dseq: self.dseq,
            gseq,
        }
    }
}

impl GroupId {
    pub fn deployment_id(&self) -> DeploymentId {
        DeploymentId {
            owner: self.owner.clone(),
            dseq: self.dseq,
        }
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.dseq)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.dseq, self.gseq)
    }
}

// ── Lifecycle states ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} state: {value:?}")]
pub struct UnknownState {
    pub kind: &'static str,
    pub value: String,
}

/// Deployment lifecycle. `Invalid` is never stored; it only exists so that
/// wire input naming it can be recognised and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Invalid,
    Active,
    Closed,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Invalid => "invalid",
            DeploymentState::Active => "active",
            DeploymentState::Closed => "closed",
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, DeploymentState::Invalid)
    }
}

impl FromStr for DeploymentState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalid" => Ok(DeploymentState::Invalid),
            "active" => Ok(DeploymentState::Active),
            "closed" => Ok(DeploymentState::Closed),
            _ => Err(UnknownState {
                kind: "deployment",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group lifecycle. Mirrors the owning deployment: closing the deployment
/// closes every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Invalid,
    Open,
    Paused,
    Closed,
}

impl GroupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupState::Invalid => "invalid",
            GroupState::Open => "open",
            GroupState::Paused => "paused",
            GroupState::Closed => "closed",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Group specification ───────────────────────────────────────────

/// What a group asks of the providers that may host it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequirements {
    /// Auditor identities whose signature a provider must carry.
    #[serde(default)]
    pub signed_by: Vec<String>,
    /// Provider attributes that must match exactly.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// One replicated unit of compute inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUnit {
    /// CPU in thousandths of a core.
    pub cpu_millis: u32,
    pub memory_bytes: u64,
    #[serde(default)]
    pub storage_bytes: u64,
    /// Number of replicas of this unit.
    pub count: u32,
}

/// Specification of a group as submitted in a create or update transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub requirements: PlacementRequirements,
    pub resources: Vec<ResourceUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("deployment must declare at least one group")]
    NoGroups,

    #[error("deployment declares {0} groups, at most {MAX_GROUPS_PER_DEPLOYMENT} allowed")]
    TooManyGroups(usize),

    #[error("group name is empty")]
    EmptyGroupName,

    #[error("group name {0:?} is longer than {MAX_GROUP_NAME_LEN} characters")]
    GroupNameTooLong(String),

    #[error("duplicate group name {0:?}")]
    DuplicateGroupName(String),

    #[error("group {0:?} declares no resources")]
    NoResources(String),

    #[error("group {group:?}: {reason}")]
    InvalidResource { group: String, reason: String },
}

impl GroupSpec {
    /// Validate a single group in isolation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyGroupName);
        }
        if name.len() > MAX_GROUP_NAME_LEN {
            return Err(ValidationError::GroupNameTooLong(self.name.clone()));
        }
        if self.resources.is_empty() {
            return Err(ValidationError::NoResources(self.name.clone()));
        }
        for unit in &self.resources {
            let reason = if unit.count == 0 {
                Some("resource count must be positive".to_string())
            } else if unit.count > MAX_UNIT_COUNT {
                Some(format!("resource count {} exceeds {MAX_UNIT_COUNT}", unit.count))
            } else if unit.cpu_millis == 0 {
                Some("cpu_millis must be positive".to_string())
            } else if unit.memory_bytes == 0 {
                Some("memory_bytes must be positive".to_string())
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ValidationError::InvalidResource {
                    group: self.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

/// Validate the full group set of a deployment.
pub fn validate_groups(groups: &[GroupSpec]) -> Result<(), ValidationError> {
    if groups.is_empty() {
        return Err(ValidationError::NoGroups);
    }
    if groups.len() > MAX_GROUPS_PER_DEPLOYMENT {
        return Err(ValidationError::TooManyGroups(groups.len()));
    }
    let mut seen = std::collections::HashSet::new();
    for group in groups {
        group.validate()?;
        if !seen.insert(group.name.trim()) {
            return Err(ValidationError::DuplicateGroupName(group.name.clone()));
        }
    }
    Ok(())
}

/// Content hash of a group set, hex-encoded SHA-256 over its JSON form.
///
/// Attribute maps are ordered, so equal specs always hash equally.
pub fn groups_version(groups: &[GroupSpec]) -> String {
    // Serializing plain structs with String/number/BTreeMap fields cannot fail.
    let bytes = serde_json::to_vec(groups).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
