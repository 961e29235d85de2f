//! Issuance ledger for keysmith - database operations and persistence.
//!
//! ## Module Structure
//!
//! - `db`: Database initialization, migration, and connection management
//! - `ledger`: Atomic serial allocation and issuance audit queries
//! - `error`: Error types and results

mod db;
mod error;
mod ledger;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use db::*;
pub use error::{DbError, DbResult};
pub use ks_types::state::{DbHandle, DbLocation, LedgerPool};
pub use ledger::*;
