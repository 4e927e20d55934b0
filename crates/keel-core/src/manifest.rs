//! Deployment manifest (`deployment.toml`) parser.
//!
//! ```toml
//! [[group]]
//! name = "web"
//!
//! [group.requirements.attributes]
//! region = "us-west"
//!
//! [[group.resources]]
//! cpu_millis = 500
//! memory_bytes = 536870912
//! count = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{GroupSpec, ValidationError, groups_version, validate_groups};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    /// Explicit deployment sequence; assigned by the registry when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dseq: Option<u64>,
    #[serde(rename = "group", default)]
    pub groups: Vec<GroupSpec>,
}

impl DeploymentManifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let manifest: DeploymentManifest = toml::from_str(content)?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_groups(&self.groups)
    }

    /// Content hash identifying this revision of the groups.
    pub fn version(&self) -> String {
        groups_version(&self.groups)
    }
}
