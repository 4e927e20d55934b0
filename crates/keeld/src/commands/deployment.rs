use std::path::{Path, PathBuf};

use clap::Subcommand;
use keel_core::{DeploymentId, DeploymentManifest, KeelConfig, Owner};
use keel_ledger::Transition;

#[derive(Subcommand)]
pub enum DeploymentAction {
    /// Create a deployment from a manifest.
    Create {
        /// Signing owner.
        signer: Owner,
        /// Path to deployment.toml.
        #[arg(short, long, default_value = "deployment.toml")]
        manifest: PathBuf,
        /// Explicit sequence; overrides the manifest's `dseq`.
        #[arg(long)]
        dseq: Option<u64>,
    },
    /// Replace the group specs of a deployment.
    Update {
        signer: Owner,
        dseq: u64,
        #[arg(short, long, default_value = "deployment.toml")]
        manifest: PathBuf,
    },
    /// Close a deployment and all of its groups.
    Close { signer: Owner, dseq: u64 },
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Close one group.
    Close { signer: Owner, dseq: u64, gseq: u32 },
    /// Pause an open group.
    Pause { signer: Owner, dseq: u64, gseq: u32 },
    /// Resume a paused group.
    Start { signer: Owner, dseq: u64, gseq: u32 },
}

fn load_manifest(path: &Path) -> anyhow::Result<DeploymentManifest> {
    let manifest = DeploymentManifest::from_file(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    manifest.validate()?;
    Ok(manifest)
}

pub async fn run(config: &KeelConfig, action: DeploymentAction) -> anyhow::Result<()> {
    let transition = match action {
        DeploymentAction::Create {
            signer,
            manifest,
            dseq,
        } => {
            let manifest = load_manifest(&manifest)?;
            Transition::CreateDeployment {
                signer,
                dseq: dseq.or(manifest.dseq),
                groups: manifest.groups,
            }
        }
        DeploymentAction::Update {
            signer,
            dseq,
            manifest,
        } => {
            let manifest = load_manifest(&manifest)?;
            Transition::UpdateDeployment {
                id: DeploymentId::new(signer.clone(), dseq),
                signer,
                groups: manifest.groups,
            }
        }
        DeploymentAction::Close { signer, dseq } => Transition::CloseDeployment {
            id: DeploymentId::new(signer.clone(), dseq),
            signer,
        },
    };
    super::submit_offline(config, transition).await
}

pub async fn run_group(config: &KeelConfig, action: GroupAction) -> anyhow::Result<()> {
    let group = |signer: &Owner, dseq, gseq| DeploymentId::new(signer.clone(), dseq).group(gseq);
    let transition = match action {
        GroupAction::Close { signer, dseq, gseq } => Transition::CloseGroup {
            id: group(&signer, dseq, gseq),
            signer,
        },
        GroupAction::Pause { signer, dseq, gseq } => Transition::PauseGroup {
            id: group(&signer, dseq, gseq),
            signer,
        },
        GroupAction::Start { signer, dseq, gseq } => Transition::StartGroup {
            id: group(&signer, dseq, gseq),
            signer,
        },
    };
    super::submit_offline(config, transition).await
}
