use std::collections::HashSet;

use anyhow::Result;
use ks_types::CertClass;
use state_store::{IssuanceLedger, count_issuances, fetch_issuance, test_support::SqliteTestDbFactory};

#[tokio::test]
async fn record_issuance_returns_increasing_serials() -> Result<()> {
    let factory = SqliteTestDbFactory::new();
    let ledger = factory.ledger().await?;

    let first = ledger.record_issuance(CertClass::Host, "host.example.com", b"key-one").await?;
    let second = ledger.record_issuance(CertClass::User, "alice", b"key-two").await?;

    assert!(first >= 1);
    assert!(second > first);
    assert_eq!(count_issuances(&ledger).await?, 2);
    Ok(())
}

#[tokio::test]
async fn recorded_issuance_can_be_fetched() -> Result<()> {
    let factory = SqliteTestDbFactory::new();
    let ledger = factory.ledger().await?;

    let before = chrono::Utc::now().timestamp();
    let serial = ledger.record_issuance(CertClass::User, "alice", b"\x00\x01wire").await?;

    let record = fetch_issuance(&ledger, serial).await?.expect("record exists");
    assert_eq!(record.serial, serial);
    assert_eq!(record.class, CertClass::User);
    assert_eq!(record.identity, "alice");
    assert_eq!(record.public_key, b"\x00\x01wire".to_vec());
    assert!(record.issued_at >= before);

    assert!(fetch_issuance(&ledger, serial + 1000).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn concurrent_issuances_never_share_a_serial() -> Result<()> {
    const REQUESTS: usize = 64;

    let factory = SqliteTestDbFactory::new();
    let ledger = factory.ledger_with_connections(8).await?;

    let mut tasks = Vec::with_capacity(REQUESTS);
    for i in 0..REQUESTS {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move {
            let class = if i % 2 == 0 { CertClass::Host } else { CertClass::User };
            ledger.record_issuance(class, &format!("identity-{i}"), b"key").await
        }));
    }

    let mut serials = HashSet::new();
    for task in tasks {
        serials.insert(task.await??);
    }

    assert_eq!(serials.len(), REQUESTS);
    assert_eq!(count_issuances(&ledger).await?, REQUESTS as u64);
    Ok(())
}

#[tokio::test]
async fn serials_are_not_reused_after_deletion() -> Result<()> {
    let factory = SqliteTestDbFactory::new();
    let ledger = factory.ledger().await?;

    let first = ledger.record_issuance(CertClass::Host, "a.example.com", b"k").await?;
    if let state_store::LedgerPool::Sqlite(pool) = &ledger.pool {
        sqlx::query("DELETE FROM issued_certificates WHERE serial = ?")
            .bind(first as i64)
            .execute(pool)
            .await?;
    }
    let second = ledger.record_issuance(CertClass::Host, "b.example.com", b"k").await?;

    assert!(second > first);
    Ok(())
}
