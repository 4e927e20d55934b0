//! Read side of the Keel deployment registry.
//!
//! Queries arrive as partial filters whose fields are raw wire strings.
//! [`filter`] validates and compiles them into a pure predicate plus a key
//! scope before anything touches storage; [`engine`] runs the compiled
//! filter against a `StateStore` snapshot and pages the results with
//! version-stamped cursors ([`cursor`]).
//!
//! Listing and singleton lookup are deliberately separate paths: a list
//! with zero matches is an empty success, a lookup of a missing key is
//! `NotFound`, and an owner-only lookup is rejected as under-specified.

pub mod cursor;
pub mod engine;
pub mod error;
pub mod filter;
pub mod page;

pub use engine::{DeploymentsPage, QueryEngine, QueryLimits};
pub use error::QueryError;
pub use filter::{
    CertificateFilters, CompiledFilter, DeploymentFilters, DeploymentIdParams, GroupIdParams,
};
pub use page::{PageRequest, PageResponse};
