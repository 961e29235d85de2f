//! Shared state-store data models.
//!
//! These structs describe where the issuance ledger lives and how it is
//! reached. They sit in `ks-types` so the binary and the engine can pass
//! handles around without depending on state-store internals.

use std::path::PathBuf;

#[cfg(feature = "sqlx")]
use sqlx::{MySqlPool, SqlitePool};

/// Connection pool for one of the supported ledger backends.
#[cfg(feature = "sqlx")]
#[derive(Clone, Debug)]
pub enum LedgerPool {
    /// Embedded file-backed database.
    Sqlite(SqlitePool),
    /// Networked relational database.
    MySql(MySqlPool),
}

/// Wrapper around a ledger connection pool plus metadata about its origin.
#[cfg(feature = "sqlx")]
#[derive(Clone, Debug)]
pub struct DbHandle {
    /// Shared connection pool used by callers.
    pub pool: LedgerPool,
    /// Connection URL used to construct the pool, with credentials removed.
    pub url: String,
    /// Filesystem path when backed by a local file; `None` for pure URLs.
    pub path: Option<PathBuf>,
    /// True when the database file was just created.
    pub freshly_created: bool,
}

#[cfg(feature = "sqlx")]
impl DbHandle {
    /// Close every pooled connection. Outstanding queries finish first.
    pub async fn close(&self) {
        match &self.pool {
            LedgerPool::Sqlite(pool) => pool.close().await,
            LedgerPool::MySql(pool) => pool.close().await,
        }
    }
}

/// Concrete location details for a SQLite-backed ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbLocation {
    /// Connection URL (e.g., `sqlite:///var/lib/keysmith/ledger.db` or `sqlite::memory:`).
    pub url: String,
    /// Local filesystem path when the database is file-backed; `None` for pure URLs.
    pub path: Option<PathBuf>,
    /// Flag indicating the database was just created (used to trigger migrations/logs).
    pub freshly_created: bool,
}
