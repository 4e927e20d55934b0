//! Persisted records of the registry.
//!
//! These types represent the stored state of deployments, groups, and
//! client certificates. All types are serializable to/from JSON for
//! storage in redb tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use keel_core::{DeploymentId, DeploymentState, GroupId, GroupSpec, GroupState, Owner, UnknownState};

// ── Deployment ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub deployment_id: DeploymentId,
    pub state: DeploymentState,
    /// Content hash of the current group specs.
    pub version: String,
    /// Ledger height of the create transition.
    pub created_at: u64,
    /// Ledger height of the last transition that touched this deployment.
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub state: GroupState,
    pub group_spec: GroupSpec,
    pub created_at: u64,
}

/// A deployment together with all of its groups, in ascending gseq order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEntry {
    pub deployment: Deployment,
    pub groups: Vec<Group>,
}

impl DeploymentEntry {
    pub fn id(&self) -> &DeploymentId {
        &self.deployment.deployment_id
    }

    pub fn group(&self, gseq: u32) -> Option<&Group> {
        self.groups.iter().find(|g| g.group_id.gseq == gseq)
    }
}

// ── Certificate ────────────────────────────────────────────────────

/// Activation status of a client certificate.
///
/// The absence of a record is the fourth state, "no certificate".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Generated,
    Published,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Generated => "generated",
            CertificateStatus::Published => "published",
            CertificateStatus::Revoked => "revoked",
        }
    }
}

impl FromStr for CertificateStatus {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generated" => Ok(CertificateStatus::Generated),
            "published" => Ok(CertificateStatus::Published),
            "revoked" => Ok(CertificateStatus::Revoked),
            _ => Err(UnknownState {
                kind: "certificate",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The public half of an owner's client certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub owner: Owner,
    /// Hex-encoded X.509 serial number.
    pub serial: String,
    pub cert_pem: String,
    pub public_key_pem: String,
    pub status: CertificateStatus,
    pub generated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<u64>,
}
