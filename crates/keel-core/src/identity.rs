//! Owner identity resolution.
//!
//! An owner is an account address of the form `<hrp>1<data>`: a short
//! lowercase human-readable prefix, the separator `1`, then lowercase
//! alphanumerics. Only addresses that pass [`Owner::parse`] can scope
//! deployments or hold a certificate.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{1,16}1[a-z0-9]{6,80}$").expect("owner address pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("owner address is empty")]
    Empty,

    #[error("malformed owner address: {0}")]
    Malformed(String),
}

/// A verified owner identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

impl Owner {
    /// Resolve a caller-supplied address into a verified owner.
    pub fn parse(address: &str) -> Result<Self, IdentityError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(IdentityError::Empty);
        }
        if !ADDRESS.is_match(address) {
            return Err(IdentityError::Malformed(address.to_string()));
        }
        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Owner {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Owner {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}
