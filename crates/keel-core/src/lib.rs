//! Shared types for the Keel deployment registry.
//!
//! Holds the composite identifiers (`DeploymentId`, `GroupId`), the
//! lifecycle enums with their `Invalid` sentinels, group specifications,
//! owner identity resolution, the TOML deployment manifest, and the
//! daemon configuration file.

pub mod config;
pub mod identity;
pub mod manifest;
pub mod types;

pub use config::KeelConfig;
pub use identity::{IdentityError, Owner};
pub use manifest::DeploymentManifest;
pub use types::*;
