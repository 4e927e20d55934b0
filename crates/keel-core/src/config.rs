//! keel.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable single-node configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeelConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub ledger: LedgerConfig,
    pub certificates: CertificateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when a request does not name one.
    pub default_limit: u64,
    /// Upper bound on any requested page size.
    pub max_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How long a caller waits for a transition to be finalized.
    pub finality_timeout_ms: u64,
    /// Pending submissions buffered ahead of the writer.
    pub queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Organization name written into generated client certificates.
    pub organization: String,
    /// Expiry date of generated certificates, `YYYY-MM-DD`.
    pub not_after: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 1317)),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/keel"),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            finality_timeout_ms: 10_000,
            queue_depth: 256,
        }
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            organization: "Keel".to_string(),
            not_after: "2036-01-01".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }
}

impl CertificateConfig {
    /// Split `not_after` into `(year, month, day)`.
    pub fn not_after_ymd(&self) -> anyhow::Result<(i32, u8, u8)> {
        let mut parts = self.not_after.trim().splitn(3, '-');
        let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
            anyhow::bail!("certificates.not_after must be YYYY-MM-DD, got {:?}", self.not_after);
        };
        let (year, month, day): (i32, u8, u8) = (y.parse()?, m.parse()?, d.parse()?);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            anyhow::bail!("certificates.not_after out of range: {:?}", self.not_after);
        }
        Ok((year, month, day))
    }
}

impl KeelConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KeelConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            anyhow::bail!(
                "query.default_limit must be in 1..={}, got {}",
                self.query.max_limit,
                self.query.default_limit
            );
        }
        if self.ledger.queue_depth == 0 {
            anyhow::bail!("ledger.queue_depth must be positive");
        }
        self.certificates.not_after_ymd()?;
        Ok(())
    }

    /// Path of the registry database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join("keel.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: KeelConfig = toml::from_str("").unwrap();
        assert_eq!(config, KeelConfig::default());
        assert_eq!(config.query.default_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_overrides() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:9000"

[query]
default_limit = 10
"#;
        let config: KeelConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.query.default_limit, 10);
        assert_eq!(config.query.max_limit, 1000);
        assert_eq!(config.ledger.finality_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_default_limit_above_max() {
        let mut config = KeelConfig::default();
        config.query.default_limit = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn not_after_parses() {
        let certs = CertificateConfig::default();
        assert_eq!(certs.not_after_ymd().unwrap(), (2036, 1, 1));
        let bad = CertificateConfig {
            not_after: "2036/01/01".to_string(),
            ..CertificateConfig::default()
        };
        assert!(bad.not_after_ymd().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = KeelConfig::default();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("default_limit"));
        let parsed: KeelConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keel.toml");
        std::fs::write(&path, "[ledger]\nqueue_depth = 0\n").unwrap();
        assert!(KeelConfig::from_file(&path).is_err());
    }
}
