//! Certificate authority: persists certificate lifecycle changes.
//!
//! Holds an injected `StateStore` handle. Heights are supplied by the
//! caller (the ledger), which also serializes every call that writes.

use tracing::{info, warn};

use keel_core::Owner;
use keel_state::{CertificateRecord, CertificateStatus, StateStore};

use crate::error::CertError;
use crate::gate::WriteGate;
use crate::generate::{CertificateOptions, ClientCertificate, generate_client_cert};
use crate::lifecycle::{self, CertAction};

#[derive(Clone)]
pub struct CertificateAuthority {
    store: StateStore,
    options: CertificateOptions,
}

impl CertificateAuthority {
    pub fn new(store: StateStore, options: CertificateOptions) -> Self {
        Self { store, options }
    }

    /// Current status of `owner`'s certificate, `None` if never generated.
    pub fn status(&self, owner: &Owner) -> Result<Option<CertificateStatus>, CertError> {
        Ok(self.store.get_certificate(owner)?.map(|r| r.status))
    }

    /// Generate a new client certificate for `owner` and record it as
    /// `Generated`. The returned key material is not kept.
    pub fn generate(
        &self,
        owner: &Owner,
        overwrite: bool,
        height: u64,
    ) -> Result<(ClientCertificate, CertificateRecord), CertError> {
        let current = self.status(owner)?;
        let status = lifecycle::transition(owner, current, CertAction::Generate { overwrite })?;

        let cert = generate_client_cert(owner, &self.options)?;
        let record = CertificateRecord {
            owner: owner.clone(),
            serial: cert.serial.clone(),
            cert_pem: cert.cert_pem.clone(),
            public_key_pem: cert.public_key_pem.clone(),
            status,
            generated_at: height,
            published_at: None,
            revoked_at: None,
        };
        self.store.put_certificate(&record, height)?;
        if current.is_some() {
            info!(%owner, previous = ?current, "client certificate replaced");
        }
        Ok((cert, record))
    }

    /// Publish the generated certificate, making it able to authorize writes.
    pub fn publish(&self, owner: &Owner, height: u64) -> Result<CertificateRecord, CertError> {
        self.advance(owner, CertAction::Publish, height)
    }

    /// Revoke the published certificate.
    pub fn revoke(&self, owner: &Owner, height: u64) -> Result<CertificateRecord, CertError> {
        self.advance(owner, CertAction::Revoke, height)
    }

    fn advance(
        &self,
        owner: &Owner,
        action: CertAction,
        height: u64,
    ) -> Result<CertificateRecord, CertError> {
        let record = self.store.get_certificate(owner)?;
        let status = lifecycle::transition(owner, record.as_ref().map(|r| r.status), action)?;
        let Some(mut record) = record else {
            return Err(CertError::NotGenerated(owner.clone()));
        };
        record.status = status;
        match status {
            CertificateStatus::Published => record.published_at = Some(height),
            CertificateStatus::Revoked => record.revoked_at = Some(height),
            CertificateStatus::Generated => {}
        }
        self.store.put_certificate(&record, height)?;
        info!(%owner, %status, serial = %record.serial, height, "client certificate {}", action.name());
        Ok(record)
    }
}

impl WriteGate for CertificateAuthority {
    fn authorize_write(&self, signer: &Owner) -> Result<(), CertError> {
        let current = self.status(signer)?;
        lifecycle::authorize(signer, current).inspect_err(|e| {
            warn!(%signer, error = %e, "write rejected");
        })
    }
}
