//! Assembly of the registry subsystems from a `KeelConfig`.

use keel_cert::{CertificateAuthority, CertificateOptions};
use keel_core::KeelConfig;
use keel_ledger::{Applier, Ledger, LedgerHandle};
use keel_query::{QueryEngine, QueryLimits};
use keel_state::StateStore;
use tokio::task::JoinHandle;
use tracing::info;

/// Open the registry file, creating the data directory on first use.
pub fn open_store(config: &KeelConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, height = store.height()?, "registry opened");
    Ok(store)
}

/// A running registry: store, ledger writer and query engine.
pub struct Node {
    pub store: StateStore,
    pub query: QueryEngine,
    pub ledger: LedgerHandle,
    pub writer: JoinHandle<()>,
}

impl Node {
    /// Open the on-disk registry named by `config` and start its ledger.
    pub fn open(config: &KeelConfig) -> anyhow::Result<Self> {
        Self::with_store(open_store(config)?, config)
    }

    /// Start a node over an existing store.
    pub fn with_store(store: StateStore, config: &KeelConfig) -> anyhow::Result<Self> {
        let options = CertificateOptions::try_from(&config.certificates)?;
        let authority = CertificateAuthority::new(store.clone(), options);
        let (ledger, writer) = Ledger::spawn(Applier::new(store.clone(), authority), &config.ledger)?;
        let query = QueryEngine::new(store.clone(), QueryLimits::from(&config.query));
        Ok(Self {
            store,
            query,
            ledger,
            writer,
        })
    }

    pub fn api_state(&self) -> keel_api::ApiState {
        keel_api::ApiState {
            query: self.query.clone(),
            ledger: self.ledger.clone(),
        }
    }

    /// Drop the ledger handle and wait for the writer to drain.
    pub async fn shutdown(self) {
        let Node { ledger, writer, .. } = self;
        drop(ledger);
        let _ = writer.await;
    }
}
