//! Issuance ledger: serial allocation and the audit trail of issued certificates.
//!
//! A serial is the row id produced by a single `INSERT`, so allocation and
//! recording are one statement. There is no read-then-write window in which two
//! callers could observe the same serial, and a serial only exists once its
//! record is committed.

use async_trait::async_trait;
use ks_types::{CertClass, IssuanceRecord, state::{DbHandle, LedgerPool}};
use sqlx::{MySqlExecutor, SqliteExecutor};

use crate::{DbError, DbResult};

/// Durable store that hands out certificate serials.
///
/// Implementations must be safe to call concurrently; every successful call
/// returns a serial never returned before by the same ledger.
#[async_trait]
pub trait IssuanceLedger: Send + Sync {
    /// Allocate a new serial and durably record the issuance in one step.
    async fn record_issuance(&self, class: CertClass, identity: &str, public_key: &[u8]) -> DbResult<u64>;
}

#[async_trait]
impl IssuanceLedger for DbHandle {
    async fn record_issuance(&self, class: CertClass, identity: &str, public_key: &[u8]) -> DbResult<u64> {
        let issued_at = chrono::Utc::now().timestamp();
        match &self.pool {
            LedgerPool::Sqlite(pool) => record_issuance_sqlite(pool, class, identity, public_key, issued_at).await,
            LedgerPool::MySql(pool) => record_issuance_mysql(pool, class, identity, public_key, issued_at).await,
        }
    }
}

/// Insert an issuance row into a SQLite ledger and return its serial.
pub async fn record_issuance_sqlite(
    executor: impl SqliteExecutor<'_>,
    class: CertClass,
    identity: &str,
    public_key: &[u8],
    issued_at: i64,
) -> DbResult<u64> {
    let result = sqlx::query(
        "INSERT INTO issued_certificates (cert_type, identity, public_key, issued_at) VALUES (?, ?, ?, ?)",
    )
    .bind(i64::from(class.wire_value()))
    .bind(identity)
    .bind(public_key)
    .bind(issued_at)
    .execute(executor)
    .await?;

    let rowid = result.last_insert_rowid();
    u64::try_from(rowid).map_err(|_| DbError::CorruptRow {
        serial: 0,
        reason: format!("negative rowid {rowid}"),
    })
}

/// Insert an issuance row into a MySQL ledger and return its serial.
pub async fn record_issuance_mysql(
    executor: impl MySqlExecutor<'_>,
    class: CertClass,
    identity: &str,
    public_key: &[u8],
    issued_at: i64,
) -> DbResult<u64> {
    let result = sqlx::query(
        "INSERT INTO issued_certificates (cert_type, identity, public_key, issued_at) VALUES (?, ?, ?, ?)",
    )
    .bind(class.wire_value())
    .bind(identity)
    .bind(public_key)
    .bind(issued_at)
    .execute(executor)
    .await?;

    Ok(result.last_insert_id())
}

/// Look up a single issuance by serial.
pub async fn fetch_issuance(handle: &DbHandle, serial: u64) -> DbResult<Option<IssuanceRecord>> {
    const SQL: &str =
        "SELECT serial, cert_type, identity, public_key, issued_at FROM issued_certificates WHERE serial = ?";
    match &handle.pool {
        LedgerPool::Sqlite(pool) => {
            let Ok(key) = i64::try_from(serial) else {
                return Ok(None);
            };
            let row = sqlx::query_as::<_, (i64, i64, String, Vec<u8>, i64)>(SQL)
                .bind(key)
                .fetch_optional(pool)
                .await?;
            row.map(|(serial, cert_type, identity, public_key, issued_at)| {
                let serial = serial as u64;
                to_record(serial, cert_type, identity, public_key, issued_at)
            })
            .transpose()
        }
        LedgerPool::MySql(pool) => {
            let row = sqlx::query_as::<_, (u64, i32, String, Vec<u8>, i64)>(SQL)
                .bind(serial)
                .fetch_optional(pool)
                .await?;
            row.map(|(serial, cert_type, identity, public_key, issued_at)| {
                to_record(serial, i64::from(cert_type), identity, public_key, issued_at)
            })
            .transpose()
        }
    }
}

/// Total number of issuances recorded in the ledger.
pub async fn count_issuances(handle: &DbHandle) -> DbResult<u64> {
    const SQL: &str = "SELECT COUNT(*) FROM issued_certificates";
    let count: i64 = match &handle.pool {
        LedgerPool::Sqlite(pool) => sqlx::query_scalar(SQL).fetch_one(pool).await?,
        LedgerPool::MySql(pool) => sqlx::query_scalar(SQL).fetch_one(pool).await?,
    };
    Ok(count.max(0) as u64)
}

fn to_record(
    serial: u64,
    cert_type: i64,
    identity: String,
    public_key: Vec<u8>,
    issued_at: i64,
) -> DbResult<IssuanceRecord> {
    let class = u32::try_from(cert_type)
        .ok()
        .and_then(|value| CertClass::try_from(value).ok())
        .ok_or_else(|| DbError::CorruptRow {
            serial,
            reason: format!("unknown cert_type {cert_type}"),
        })?;
    Ok(IssuanceRecord {
        serial,
        class,
        identity,
        public_key,
        issued_at,
    })
}
