//! redb-backed registry persistence.
//!
//! Provides typed operations over deployments, groups, certificates, and
//! ledger metadata. All record values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).
//!
//! Every write runs in a single redb write transaction that also stamps
//! the ledger height and bumps the registry version, so a deployment and
//! its groups always appear (or change) together.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use tracing::debug;

use keel_core::{DeploymentId, GroupId, Owner};

use crate::error::{StateError, StateResult};
use crate::keys::{KeyScope, deployment_key, group_key, group_prefix, owner_prefix};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Paging parameters for [`StateStore::list_deployments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    /// Resume strictly after this deployment key.
    pub after: Option<String>,
    /// Matches to skip before the first returned entry.
    pub offset: u64,
    /// Maximum entries returned.
    pub limit: u64,
    /// Keep scanning past the page to count every match.
    pub count_total: bool,
    /// Registry version the resumed cursor was issued at.
    pub issued_at: Option<u64>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            after: None,
            offset: 0,
            limit: 100,
            count_total: false,
            issued_at: None,
        }
    }
}

/// One page of a deployment listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub entries: Vec<DeploymentEntry>,
    /// Key of the last returned entry when more matches follow.
    pub next_key: Option<String>,
    /// Number of matches in the scanned range, when requested.
    pub total: Option<u64>,
    /// Registry version of the snapshot the page was read from.
    pub version: u64,
}

/// Thread-safe registry store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn read_meta(table: &impl ReadableTable<&'static str, u64>, key: &str) -> StateResult<u64> {
    Ok(table
        .get(key)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0))
}

fn load_groups(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    id: &DeploymentId,
) -> StateResult<Vec<Group>> {
    let prefix = group_prefix(id);
    let mut groups = Vec::new();
    for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if !key.value().starts_with(&prefix) {
            break;
        }
        groups.push(decode::<Group>(value.value())?);
    }
    Ok(groups)
}

/// Advance the registry version inside a write transaction and record the
/// ledger height. Returns the new version.
fn stamp(txn: &WriteTransaction, height: u64, mutation: bool) -> StateResult<u64> {
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    let version = read_meta(&meta, META_VERSION)? + 1;
    meta.insert(META_VERSION, version).map_err(map_err!(Write))?;
    if mutation {
        meta.insert(META_LAST_MUTATION, version)
            .map_err(map_err!(Write))?;
    }
    if height > read_meta(&meta, META_HEIGHT)? {
        meta.insert(META_HEIGHT, height).map_err(map_err!(Write))?;
    }
    Ok(version)
}

/// Accumulates matches for one page.
struct Collector<F> {
    matches: F,
    offset: u64,
    limit: u64,
    count_total: bool,
    matched: u64,
    entries: Vec<DeploymentEntry>,
    last_key: Option<String>,
    more: bool,
}

impl<F: Fn(&DeploymentEntry) -> bool> Collector<F> {
    /// Offer one candidate. Returns false once scanning can stop.
    fn offer(&mut self, key: &str, entry: DeploymentEntry) -> bool {
        if !(self.matches)(&entry) {
            return true;
        }
        self.matched += 1;
        if self.matched <= self.offset {
            return true;
        }
        if (self.entries.len() as u64) < self.limit {
            self.entries.push(entry);
            self.last_key = Some(key.to_string());
            return true;
        }
        self.more = true;
        self.count_total
    }
}

impl StateStore {
    /// Open (or create) a persistent registry at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "registry store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory registry (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory registry store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.open_table(GROUPS).map_err(map_err!(Table))?;
        txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        txn.open_table(OWNER_SEQ).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Ledger metadata ────────────────────────────────────────────

    /// Height of the last committed transition.
    pub fn height(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        read_meta(&meta, META_HEIGHT)
    }

    /// Current registry version.
    pub fn version(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        read_meta(&meta, META_VERSION)
    }

    /// Highest dseq ever assigned to `owner` (0 when none).
    pub fn last_dseq(&self, owner: &Owner) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OWNER_SEQ).map_err(map_err!(Table))?;
        read_meta(&table, owner.as_str())
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Insert a new deployment with its initial groups.
    ///
    /// Fails with `DuplicateKey` if the deployment id is already taken.
    pub fn create_deployment(&self, entry: &DeploymentEntry, height: u64) -> StateResult<()> {
        let id = entry.id();
        check_group_ids(entry)?;
        let key = deployment_key(id);
        let value = serde_json::to_vec(&entry.deployment).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            if deployments
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .is_some()
            {
                return Err(StateError::DuplicateKey(format!("deployment {id}")));
            }
            deployments
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;

            let mut groups = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            for group in &entry.groups {
                let gkey = group_key(&group.group_id);
                let gvalue = serde_json::to_vec(group).map_err(map_err!(Serialize))?;
                groups
                    .insert(gkey.as_str(), gvalue.as_slice())
                    .map_err(map_err!(Write))?;
            }

            let mut seq = txn.open_table(OWNER_SEQ).map_err(map_err!(Table))?;
            if id.dseq > read_meta(&seq, id.owner.as_str())? {
                seq.insert(id.owner.as_str(), id.dseq)
                    .map_err(map_err!(Write))?;
            }
        }
        stamp(&txn, height, false)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, groups = entry.groups.len(), height, "deployment created");
        Ok(())
    }

    /// Overwrite an existing deployment and its groups after a transition.
    ///
    /// The group set must be the one already stored; transitions amend
    /// groups, they never add or drop them.
    pub fn replace_deployment(&self, entry: &DeploymentEntry, height: u64) -> StateResult<()> {
        let id = entry.id();
        check_group_ids(entry)?;
        let key = deployment_key(id);
        let value = serde_json::to_vec(&entry.deployment).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            if deployments
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .is_none()
            {
                return Err(StateError::NotFound(format!("deployment {id}")));
            }
            deployments
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;

            let mut groups = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            let stored: Vec<GroupId> = load_groups(&groups, id)?
                .into_iter()
                .map(|g| g.group_id)
                .collect();
            let replaced: Vec<GroupId> = entry.groups.iter().map(|g| g.group_id.clone()).collect();
            if stored != replaced {
                return Err(StateError::Integrity(format!(
                    "group set of deployment {id} cannot change"
                )));
            }
            for group in &entry.groups {
                let gkey = group_key(&group.group_id);
                let gvalue = serde_json::to_vec(group).map_err(map_err!(Serialize))?;
                groups
                    .insert(gkey.as_str(), gvalue.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        stamp(&txn, height, true)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, state = %entry.deployment.state, height, "deployment replaced");
        Ok(())
    }

    /// Get a deployment and its groups.
    pub fn get_deployment(&self, id: &DeploymentId) -> StateResult<DeploymentEntry> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let groups = txn.open_table(GROUPS).map_err(map_err!(Table))?;
        let key = deployment_key(id);
        let deployment: Deployment = match deployments.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => decode(guard.value())?,
            None => return Err(StateError::NotFound(format!("deployment {id}"))),
        };
        let groups = load_groups(&groups, id)?;
        Ok(DeploymentEntry { deployment, groups })
    }

    /// Get a single group. Fails with `NotFound` when either the owning
    /// deployment or the group itself is absent.
    pub fn get_group(&self, id: &GroupId) -> StateResult<Group> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let parent = id.deployment_id();
        if deployments
            .get(deployment_key(&parent).as_str())
            .map_err(map_err!(Read))?
            .is_none()
        {
            return Err(StateError::NotFound(format!("deployment {parent}")));
        }
        let groups = txn.open_table(GROUPS).map_err(map_err!(Table))?;
        match groups.get(group_key(id).as_str()).map_err(map_err!(Read))? {
            Some(guard) => decode(guard.value()),
            None => Err(StateError::NotFound(format!("group {id}"))),
        }
    }

    /// List deployments in `scope` accepted by `matches`, in ascending
    /// `(owner, dseq)` order.
    ///
    /// A resumed listing (`page.issued_at` set) fails with `StaleCursor`
    /// when an existing deployment or group changed after the cursor was
    /// issued. Pure creates never invalidate a cursor.
    pub fn list_deployments<F>(
        &self,
        scope: &KeyScope,
        matches: F,
        page: &PageParams,
    ) -> StateResult<ListPage>
    where
        F: Fn(&DeploymentEntry) -> bool,
    {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        let version = read_meta(&meta, META_VERSION)?;
        if let Some(issued) = page.issued_at {
            let current = read_meta(&meta, META_LAST_MUTATION)?;
            if current > issued {
                return Err(StateError::StaleCursor { issued, current });
            }
        }

        let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let groups = txn.open_table(GROUPS).map_err(map_err!(Table))?;
        let mut collector = Collector {
            matches,
            offset: page.offset,
            limit: page.limit,
            count_total: page.count_total,
            matched: 0,
            entries: Vec::new(),
            last_key: None,
            more: false,
        };

        match scope {
            KeyScope::Exact(id) => {
                let key = deployment_key(id);
                let resumable = page.after.as_deref().is_none_or(|after| key.as_str() > after);
                if resumable {
                    if let Some(guard) = deployments.get(key.as_str()).map_err(map_err!(Read))? {
                        let deployment: Deployment = decode(guard.value())?;
                        let entry = DeploymentEntry {
                            groups: load_groups(&groups, id)?,
                            deployment,
                        };
                        collector.offer(&key, entry);
                    }
                }
            }
            KeyScope::All | KeyScope::Owner(_) => {
                let prefix = match scope {
                    KeyScope::Owner(owner) => owner_prefix(owner),
                    _ => String::new(),
                };
                let lower = match page.after.as_deref() {
                    Some(after) if after >= prefix.as_str() => Bound::Excluded(after),
                    _ => Bound::Included(prefix.as_str()),
                };
                for item in deployments
                    .range::<&str>((lower, Bound::Unbounded))
                    .map_err(map_err!(Read))?
                {
                    let (key, value) = item.map_err(map_err!(Read))?;
                    let key = key.value();
                    if !key.starts_with(&prefix) {
                        break;
                    }
                    let deployment: Deployment = decode(value.value())?;
                    let entry = DeploymentEntry {
                        groups: load_groups(&groups, &deployment.deployment_id)?,
                        deployment,
                    };
                    if !collector.offer(key, entry) {
                        break;
                    }
                }
            }
        }

        let next_key = if collector.more {
            collector.last_key.take()
        } else {
            None
        };
        Ok(ListPage {
            total: page.count_total.then_some(collector.matched),
            entries: collector.entries,
            next_key,
            version,
        })
    }

    // ── Certificates ───────────────────────────────────────────────

    /// Insert or replace the certificate of `record.owner`.
    pub fn put_certificate(&self, record: &CertificateRecord, height: u64) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
            table
                .insert(record.owner.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        stamp(&txn, height, false)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(owner = %record.owner, status = %record.status, height, "certificate stored");
        Ok(())
    }

    /// Get the certificate of an owner, if one was ever generated.
    pub fn get_certificate(&self, owner: &Owner) -> StateResult<Option<CertificateRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        match table.get(owner.as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all certificates, ordered by owner.
    pub fn list_certificates(&self) -> StateResult<Vec<CertificateRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }
}

/// Every group must belong to the entry's deployment, gseqs strictly ascending.
fn check_group_ids(entry: &DeploymentEntry) -> StateResult<()> {
    let id = entry.id();
    if entry.groups.is_empty() {
        return Err(StateError::Integrity(format!("deployment {id} has no groups")));
    }
    let mut previous = 0;
    for group in &entry.groups {
        if group.group_id.deployment_id() != *id {
            return Err(StateError::Integrity(format!(
                "group {} does not belong to deployment {id}",
                group.group_id
            )));
        }
        if group.group_id.gseq <= previous {
            return Err(StateError::Integrity(format!(
                "group sequence {} out of order in deployment {id}",
                group.group_id.gseq
            )));
        }
        previous = group.group_id.gseq;
    }
    Ok(())
}
