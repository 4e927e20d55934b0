//! The transition ledger in front of the Keel registry.
//!
//! Every mutation of the registry is a [`Transition`] submitted to one
//! writer task. The writer applies transitions strictly in submission
//! order; each one that commits advances the ledger height by one and is
//! final from that moment. Rejected transitions leave the height and the
//! registry untouched.
//!
//! Readers never go through the ledger: they query the `StateStore`
//! directly on MVCC snapshots.

pub mod apply;
pub mod error;
pub mod ledger;
pub mod transition;

pub use apply::{Applier, GroupAction};
pub use error::{LedgerError, TransitionError};
pub use ledger::{Ledger, LedgerHandle};
pub use transition::{Outcome, Receipt, Transition};
