//! Transitions and their finalized results.

use serde::{Deserialize, Serialize};

use keel_cert::ClientCertificate;
use keel_core::{DeploymentId, GroupId, GroupSpec, Owner};
use keel_state::{CertificateRecord, DeploymentEntry, Group};

/// A state change submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    GenerateCertificate {
        owner: Owner,
        #[serde(default)]
        overwrite: bool,
    },
    PublishCertificate {
        owner: Owner,
    },
    RevokeCertificate {
        owner: Owner,
    },
    CreateDeployment {
        signer: Owner,
        /// Assigned as the owner's next sequence when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dseq: Option<u64>,
        groups: Vec<GroupSpec>,
    },
    UpdateDeployment {
        signer: Owner,
        id: DeploymentId,
        groups: Vec<GroupSpec>,
    },
    CloseDeployment {
        signer: Owner,
        id: DeploymentId,
    },
    CloseGroup {
        signer: Owner,
        id: GroupId,
    },
    PauseGroup {
        signer: Owner,
        id: GroupId,
    },
    StartGroup {
        signer: Owner,
        id: GroupId,
    },
}

impl Transition {
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::GenerateCertificate { .. } => "generate_certificate",
            Transition::PublishCertificate { .. } => "publish_certificate",
            Transition::RevokeCertificate { .. } => "revoke_certificate",
            Transition::CreateDeployment { .. } => "create_deployment",
            Transition::UpdateDeployment { .. } => "update_deployment",
            Transition::CloseDeployment { .. } => "close_deployment",
            Transition::CloseGroup { .. } => "close_group",
            Transition::PauseGroup { .. } => "pause_group",
            Transition::StartGroup { .. } => "start_group",
        }
    }
}

/// What a finalized transition produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Carries the private key; it is not retrievable afterwards.
    CertificateGenerated {
        record: CertificateRecord,
        certificate: ClientCertificate,
    },
    CertificateUpdated {
        record: CertificateRecord,
    },
    DeploymentCreated {
        entry: DeploymentEntry,
    },
    /// `changed` is false when the update carried the current version.
    DeploymentUpdated {
        entry: DeploymentEntry,
        changed: bool,
    },
    DeploymentClosed {
        entry: DeploymentEntry,
    },
    GroupUpdated {
        group: Group,
    },
}

impl Outcome {
    /// Whether applying the transition wrote to the registry.
    pub fn committed(&self) -> bool {
        !matches!(self, Outcome::DeploymentUpdated { changed: false, .. })
    }
}

/// Proof of finality: the height the transition committed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub height: u64,
    pub outcome: Outcome,
}
