#![allow(dead_code)]

use async_trait::async_trait;
use sqlshift::datastore::DatastoreResult;
use sqlshift::{
    Datastore, DatastoreError, Dialect, MemorySource, Migration, MigrationRecord, Migrator,
    SqliteDatastore, Transaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Build a migration from statement slices
pub fn migration(id: &str, up: &[&str], down: &[&str]) -> Migration {
    Migration::new(
        id,
        up.iter().map(|s| s.to_string()).collect(),
        down.iter().map(|s| s.to_string()).collect(),
    )
}

/// Table t created by 001, column y added by 002
pub fn two_step_migrations() -> Vec<Migration> {
    vec![
        migration("001", &["CREATE TABLE t(x int)"], &["DROP TABLE t"]),
        migration(
            "002",
            &["ALTER TABLE t ADD y int"],
            &["ALTER TABLE t DROP COLUMN y"],
        ),
    ]
}

pub fn memory_store() -> Arc<SqliteDatastore> {
    let store = SqliteDatastore::open_in_memory().expect("Should open in-memory database");
    Arc::new(store)
}

pub fn migrator(store: &Arc<SqliteDatastore>, migrations: Vec<Migration>) -> Migrator {
    let datastore: Arc<dyn Datastore> = store.clone();
    Migrator::new(Arc::new(MemorySource::new(migrations)), datastore)
}

pub async fn applied_ids(migrator: &Migrator) -> Vec<String> {
    migrator
        .list_applied()
        .await
        .expect("Should list applied migrations")
        .into_iter()
        .map(|r| r.id)
        .collect()
}

pub async fn table_exists(store: &SqliteDatastore, table: &str) -> bool {
    let table = table.to_string();
    store
        .with_connection(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .expect("Should query sqlite_master")
        > 0
}

pub async fn column_exists(store: &SqliteDatastore, table: &str, column: &str) -> bool {
    let (table, column) = (table.to_string(), column.to_string());
    store
        .with_connection(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
                [table, column],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .expect("Should query table info")
        > 0
}

/// Which step of a transaction to break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Begin,
    LedgerWrite,
    Commit,
}

/// SQLite datastore that injects a failure into the nth transaction (1-based)
pub struct FaultyDatastore {
    inner: SqliteDatastore,
    fault: Fault,
    fail_on: usize,
    begun: AtomicUsize,
}

impl FaultyDatastore {
    pub fn new(fault: Fault, fail_on: usize) -> Self {
        Self {
            inner: SqliteDatastore::open_in_memory().expect("Should open in-memory database"),
            fault,
            fail_on,
            begun: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &SqliteDatastore {
        &self.inner
    }
}

fn injected(what: &str) -> DatastoreError {
    DatastoreError::Driver(format!("injected {what} failure"))
}

#[async_trait]
impl Datastore for FaultyDatastore {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn begin(&self) -> DatastoreResult<Box<dyn Transaction>> {
        let n = self.begun.fetch_add(1, Ordering::SeqCst) + 1;
        let fault = (n == self.fail_on).then_some(self.fault);
        if fault == Some(Fault::Begin) {
            return Err(injected("begin"));
        }
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fault,
        }))
    }

    async fn ledger_exists(&self, table: &str) -> DatastoreResult<bool> {
        self.inner.ledger_exists(table).await
    }

    async fn ensure_ledger(&self, table: &str) -> DatastoreResult<()> {
        self.inner.ensure_ledger(table).await
    }

    async fn max_applied_id(&self, table: &str) -> DatastoreResult<Option<String>> {
        self.inner.max_applied_id(table).await
    }

    async fn applied_records(&self, table: &str) -> DatastoreResult<Vec<MigrationRecord>> {
        self.inner.applied_records(table).await
    }
}

struct FaultyTransaction {
    inner: Box<dyn Transaction>,
    fault: Option<Fault>,
}

#[async_trait]
impl Transaction for FaultyTransaction {
    async fn execute(&mut self, statement: &str) -> DatastoreResult<()> {
        self.inner.execute(statement).await
    }

    async fn insert_record(
        &mut self,
        table: &str,
        record: &MigrationRecord,
    ) -> DatastoreResult<()> {
        if self.fault == Some(Fault::LedgerWrite) {
            return Err(injected("ledger insert"));
        }
        self.inner.insert_record(table, record).await
    }

    async fn delete_record(&mut self, table: &str, id: &str) -> DatastoreResult<()> {
        if self.fault == Some(Fault::LedgerWrite) {
            return Err(injected("ledger delete"));
        }
        self.inner.delete_record(table, id).await
    }

    async fn commit(&mut self) -> DatastoreResult<()> {
        // Leave the inner transaction open; dropping it rolls back
        if self.fault == Some(Fault::Commit) {
            return Err(injected("commit"));
        }
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> DatastoreResult<()> {
        self.inner.rollback().await
    }
}
