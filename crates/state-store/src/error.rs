use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with the issuance ledger.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database
    #[error("failed to open database at {path}: {source}")]
    ConnectionFailed {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed
    #[error("migration failed: {0}")]
    MigrationFailed(#[from] sqlx::migrate::MigrateError),

    /// Invalid database URL
    #[error("invalid database URL: {0}")]
    InvalidUrl(String),

    /// I/O error during database operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLx error during query execution
    #[error("database query error: {0}")]
    Query(#[from] sqlx::Error),

    /// Failed to create database directory
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create database file
    #[error("failed to create database file {path}: {source}")]
    FileCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spawn blocking task panicked
    #[error("background task panicked: {0}")]
    TaskPanicked(String),

    /// A stored row could not be mapped back to an issuance record
    #[error("corrupt ledger row for serial {serial}: {reason}")]
    CorruptRow { serial: u64, reason: String },
}

/// Result type alias for ledger operations
pub type DbResult<T> = Result<T, DbError>;
