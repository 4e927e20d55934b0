//! The Keel deployment registry store.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for deployments, groups, and client certificates, plus the
//! ledger metadata (height, registry version) that stamps every write.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{owner}/{dseq}`, `{owner}/{dseq}/{gseq}`) carry
//! zero-padded sequence numbers so that lexicographic key order is
//! ascending `(owner, dseq, gseq)` order, and a deployment's groups sit in
//! one contiguous range right behind it.
//!
//! Every read runs inside one redb read transaction, so a caller sees a
//! consistent snapshot and never a half-applied create or transition.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod keys;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use keys::KeyScope;
pub use store::{ListPage, PageParams, StateStore};
pub use types::*;
