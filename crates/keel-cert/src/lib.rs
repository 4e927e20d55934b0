//! Client certificate identity for Keel.
//!
//! An owner may write to the registry only after it has generated a client
//! certificate and then published it. The two steps are separate on purpose:
//! a generated-but-unpublished certificate authorizes nothing.
//!
//! ```text
//! (none) ──generate──▶ Generated ──publish──▶ Published ──revoke──▶ Revoked
//! ```
//!
//! Generating again over a Generated or Published certificate requires an
//! explicit overwrite and lands back in Generated. A Revoked owner may
//! generate a fresh certificate.
//!
//! - [`lifecycle`] holds the pure transition function.
//! - [`generate`] builds the X.509 client certificate with rcgen.
//! - [`authority`] persists records through the `StateStore`.
//! - [`gate`] is the seam the ledger calls before admitting a write.

pub mod authority;
pub mod error;
pub mod gate;
pub mod generate;
pub mod lifecycle;

pub use authority::CertificateAuthority;
pub use error::CertError;
pub use gate::WriteGate;
pub use generate::{CertificateOptions, ClientCertificate};
pub use lifecycle::CertAction;
