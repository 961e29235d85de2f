//! SSH key handling shared by the signing engine and the server binary.

pub mod error;
pub mod keys;

pub use error::{SshCoreError, SshResult};
