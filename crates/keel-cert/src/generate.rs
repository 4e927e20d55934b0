//! Client certificate generation.
//!
//! Produces a self-signed X.509 certificate whose subject CN is the owner
//! address. The serial number is derived from the public key, so two
//! certificates of the same owner never share a serial.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair, SerialNumber,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use keel_core::Owner;
use keel_core::config::CertificateConfig;

use crate::error::CertError;

/// Subject and validity settings for generated certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateOptions {
    pub organization: String,
    /// Expiry as `(year, month, day)`.
    pub not_after: (i32, u8, u8),
}

impl Default for CertificateOptions {
    fn default() -> Self {
        Self {
            organization: "Keel".to_string(),
            not_after: (2036, 1, 1),
        }
    }
}

impl TryFrom<&CertificateConfig> for CertificateOptions {
    type Error = CertError;

    fn try_from(config: &CertificateConfig) -> Result<Self, Self::Error> {
        let not_after = config
            .not_after_ymd()
            .map_err(|e| CertError::Config(e.to_string()))?;
        Ok(Self {
            organization: config.organization.clone(),
            not_after,
        })
    }
}

/// A freshly generated client certificate, including its private key.
///
/// The private key is handed to the caller once and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCertificate {
    /// Hex-encoded serial number.
    pub serial: String,
    /// PEM-encoded certificate.
    pub cert_pem: String,
    /// PEM-encoded public key.
    pub public_key_pem: String,
    /// PEM-encoded private key.
    pub key_pem: String,
}

fn gen_err(e: rcgen::Error) -> CertError {
    CertError::Generation(e.to_string())
}

/// Generate a self-signed client certificate for `owner`.
pub fn generate_client_cert(
    owner: &Owner,
    options: &CertificateOptions,
) -> Result<ClientCertificate, CertError> {
    let key_pair = KeyPair::generate().map_err(gen_err)?;

    let digest = Sha256::digest(key_pair.public_key_der());
    let mut serial = digest[..16].to_vec();
    // Keep the DER integer positive.
    serial[0] &= 0x7f;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, options.organization.as_str());
    dn.push(DnType::CommonName, owner.as_str());
    params.distinguished_name = dn;
    params.serial_number = Some(SerialNumber::from(serial.clone()));
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

    let (year, month, day) = options.not_after;
    params.not_after = rcgen::date_time_ymd(year, month, day);

    let cert = params.self_signed(&key_pair).map_err(gen_err)?;
    let serial = hex::encode(&serial);

    info!(%owner, %serial, "generated client certificate");

    Ok(ClientCertificate {
        serial,
        cert_pem: cert.pem(),
        public_key_pem: key_pair.public_key_pem(),
        key_pem: key_pair.serialize_pem(),
    })
}
