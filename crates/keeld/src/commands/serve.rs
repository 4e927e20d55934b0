use keel_core::KeelConfig;
use tracing::info;

use crate::node::Node;

pub async fn run(config: KeelConfig) -> anyhow::Result<()> {
    info!("Keel registry starting");
    let node = Node::open(&config)?;
    let router = keel_api::build_router(node.api_state());

    let addr = config.server.listen;
    info!(%addr, height = node.ledger.current_height(), "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    node.shutdown().await;
    info!("Keel registry stopped");
    Ok(())
}
