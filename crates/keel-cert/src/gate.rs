//! Write-authorization gate.
//!
//! The ledger holds a `WriteGate` and consults it before admitting any
//! create or update transition.

use keel_core::Owner;

use crate::error::CertError;

pub trait WriteGate: Send + Sync {
    /// Succeeds only when `signer` holds a published client certificate.
    fn authorize_write(&self, signer: &Owner) -> Result<(), CertError>;
}
