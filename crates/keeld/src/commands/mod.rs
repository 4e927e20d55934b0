pub mod cert;
pub mod deployment;
pub mod query;
pub mod serve;

use keel_core::KeelConfig;
use keel_ledger::Transition;
use serde::Serialize;

use crate::node::Node;

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one transition through an in-process ledger over the data directory.
///
/// The daemon must not be running: the registry file is opened exclusively.
pub(crate) async fn submit_offline(config: &KeelConfig, transition: Transition) -> anyhow::Result<()> {
    let node = Node::open(config)?;
    let result = node.ledger.submit(transition).await;
    node.shutdown().await;
    print_json(&result?)
}
