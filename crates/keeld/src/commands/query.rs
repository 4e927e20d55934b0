use clap::Subcommand;
use keel_core::KeelConfig;
use keel_query::{
    CertificateFilters, DeploymentFilters, DeploymentIdParams, GroupIdParams, PageRequest,
    QueryEngine, QueryLimits,
};

use super::print_json;
use crate::node::open_store;

#[derive(Subcommand)]
pub enum QueryTarget {
    /// List deployments.
    Deployments {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        dseq: Option<String>,
        #[arg(long)]
        gseq: Option<String>,
        #[arg(long)]
        state: Option<String>,
        /// Cursor from a previous page.
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        offset: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        count_total: bool,
    },
    /// Get one deployment.
    Deployment { owner: String, dseq: String },
    /// Get one group.
    Group {
        owner: String,
        dseq: String,
        gseq: String,
    },
    /// List certificates.
    Certificates {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        state: Option<String>,
    },
}

pub fn run(config: &KeelConfig, target: QueryTarget) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let engine = QueryEngine::new(store, QueryLimits::from(&config.query));
    match target {
        QueryTarget::Deployments {
            owner,
            dseq,
            gseq,
            state,
            key,
            offset,
            limit,
            count_total,
        } => {
            let filters = DeploymentFilters {
                owner,
                dseq,
                gseq,
                state,
            };
            let page = PageRequest {
                key,
                offset,
                limit,
                count_total,
            };
            print_json(&engine.query_deployments(&filters, &page)?)
        }
        QueryTarget::Deployment { owner, dseq } => {
            print_json(&engine.query_deployment(&DeploymentIdParams::new(owner, dseq))?)
        }
        QueryTarget::Group { owner, dseq, gseq } => {
            print_json(&engine.query_group(&GroupIdParams::new(owner, dseq, gseq))?)
        }
        QueryTarget::Certificates { owner, state } => {
            print_json(&engine.query_certificates(&CertificateFilters { owner, state })?)
        }
    }
}
