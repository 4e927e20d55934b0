use clap::Subcommand;
use keel_core::{KeelConfig, Owner};
use keel_ledger::Transition;

#[derive(Subcommand)]
pub enum CertAction {
    /// Generate a client certificate; prints the private key once.
    Generate {
        owner: Owner,
        /// Replace an existing generated or published certificate.
        #[arg(long)]
        overwrite: bool,
    },
    /// Publish the generated certificate so it can authorize writes.
    Publish { owner: Owner },
    /// Revoke the published certificate.
    Revoke { owner: Owner },
}

pub async fn run(config: &KeelConfig, action: CertAction) -> anyhow::Result<()> {
    let transition = match action {
        CertAction::Generate { owner, overwrite } => {
            Transition::GenerateCertificate { owner, overwrite }
        }
        CertAction::Publish { owner } => Transition::PublishCertificate { owner },
        CertAction::Revoke { owner } => Transition::RevokeCertificate { owner },
    };
    super::submit_offline(config, transition).await
}
