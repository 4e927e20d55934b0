//! redb table definitions for the Keel registry store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Key layout lives in [`crate::keys`].

use redb::TableDefinition;

/// Deployments keyed by `{owner}/{dseq:020}`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Groups keyed by `{owner}/{dseq:020}/{gseq:010}`.
pub const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Client certificates keyed by `{owner}`.
pub const CERTIFICATES: TableDefinition<&str, &[u8]> = TableDefinition::new("certificates");

/// Highest dseq ever assigned, keyed by `{owner}`.
pub const OWNER_SEQ: TableDefinition<&str, u64> = TableDefinition::new("owner_seq");

/// Ledger metadata counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Height of the last committed transition.
pub const META_HEIGHT: &str = "height";

/// Bumped by every committed write.
pub const META_VERSION: &str = "version";

/// Version of the last write that changed an existing deployment or group.
pub const META_LAST_MUTATION: &str = "last_mutation";
