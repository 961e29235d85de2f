//! Test utilities for fast, isolated SQLite ledgers.
//!
//! A migrated "template" ledger is created once per factory and copied for each
//! test, so tests can run in parallel without sharing rows or global env vars.
//!
//! By default, this uses a temporary directory that is deleted when the factory
//! is dropped. To persist test DB files for debugging, set `KS_TEST_DB_PERSIST=1`.

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use ks_types::state::{DbHandle, DbLocation};
use tempfile::TempDir;
use tokio::sync::OnceCell;

use crate::{DbError, DbResult, db::init_sqlite_pool, migrate};

fn unique_suffix() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!("{}-{}-{}", std::process::id(), now, uuid::Uuid::now_v7())
}

async fn connect_file_db(path: PathBuf, max_connections: u32, freshly_created: bool) -> DbResult<DbHandle> {
    let location = DbLocation {
        url: format!("sqlite://{}", path.display()),
        path: Some(path),
        freshly_created,
    };
    init_sqlite_pool(location, max_connections).await
}

/// Creates a migrated template ledger once and clones it per test.
#[derive(Debug)]
pub struct SqliteTestDbFactory {
    root: PathBuf,
    _tempdir: Option<TempDir>,
    template: OnceCell<PathBuf>,
}

impl SqliteTestDbFactory {
    /// Create a new factory rooted in the process temp directory.
    pub fn new() -> Self {
        let persist = std::env::var_os("KS_TEST_DB_PERSIST").is_some_and(|v| v != "0");

        let tempdir = tempfile::Builder::new()
            .prefix("keysmith-testdb-")
            .tempdir()
            .expect("failed to create temporary directory for test DBs");

        let (root, tempdir) = if persist {
            (tempdir.keep(), None)
        } else {
            (tempdir.path().to_path_buf(), Some(tempdir))
        };
        Self {
            root,
            _tempdir: tempdir,
            template: OnceCell::const_new(),
        }
    }

    async fn template_path(&self) -> DbResult<PathBuf> {
        let path = self
            .template
            .get_or_try_init(|| async {
                let template_path = self.root.join("template_ledger.db");
                let handle = connect_file_db(template_path.clone(), 1, true).await?;
                migrate(&handle).await?;
                handle.close().await;
                Ok::<_, DbError>(template_path)
            })
            .await?;
        Ok(path.clone())
    }

    /// Create a migrated ledger for a single test case, backed by a one-connection pool.
    pub async fn ledger(&self) -> DbResult<DbHandle> {
        self.ledger_with_connections(1).await
    }

    /// Create a migrated ledger whose pool allows `max_connections` concurrent writers.
    pub async fn ledger_with_connections(&self, max_connections: u32) -> DbResult<DbHandle> {
        let template = self.template_path().await?;
        let target = self.root.join(format!("ledger_{}.db", unique_suffix()));
        tokio::fs::copy(&template, &target).await?;
        connect_file_db(target, max_connections, false).await
    }
}

impl Default for SqliteTestDbFactory {
    fn default() -> Self {
        Self::new()
    }
}
