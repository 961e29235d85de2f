//! Shared type definitions for keysmith.
//!
//! Lightweight data shared by the ledger, the issuance engine and the binary:
//! certificate classes, persisted issuance rows, and the configuration model.

pub mod cert;
pub mod config;
pub mod state;

pub use cert::{CertClass, IdentityClaim, IssuanceRecord, UnknownCertClass};
