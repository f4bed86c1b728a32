//! Datastore driver boundary.
//!
//! The migration engine talks to a database only through [`Datastore`] and
//! the per-migration [`Transaction`] it hands out. Ledger SQL is rendered per
//! [`Dialect`]; only SQLite has a compiled driver.

mod dialect;
mod sqlite;

pub use dialect::Dialect;
pub use sqlite::SqliteDatastore;

use crate::migration::MigrationRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("No driver available for dialect {0}")]
    UnsupportedDialect(Dialect),

    #[error("Transaction already finished")]
    TransactionFinished,

    #[error("Driver error: {0}")]
    Driver(String),
}

pub type DatastoreResult<T> = Result<T, DatastoreError>;

/// A connection to the target database.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// The SQL dialect spoken by this datastore.
    fn dialect(&self) -> Dialect;

    /// Begin a transaction. The returned handle owns the connection until it
    /// is committed, rolled back or dropped.
    async fn begin(&self) -> DatastoreResult<Box<dyn Transaction>>;

    /// Whether the ledger table exists.
    async fn ledger_exists(&self, table: &str) -> DatastoreResult<bool>;

    /// Create the ledger table if it does not exist.
    async fn ensure_ledger(&self, table: &str) -> DatastoreResult<()>;

    /// Highest applied migration id, `None` when the ledger is empty.
    async fn max_applied_id(&self, table: &str) -> DatastoreResult<Option<String>>;

    /// All ledger records, ascending by id.
    async fn applied_records(&self, table: &str) -> DatastoreResult<Vec<MigrationRecord>>;
}

/// A transaction scoped to a single migration.
///
/// Dropping an unfinished transaction rolls it back.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, statement: &str) -> DatastoreResult<()>;

    async fn insert_record(
        &mut self,
        table: &str,
        record: &MigrationRecord,
    ) -> DatastoreResult<()>;

    async fn delete_record(&mut self, table: &str, id: &str) -> DatastoreResult<()>;

    async fn commit(&mut self) -> DatastoreResult<()>;

    async fn rollback(&mut self) -> DatastoreResult<()>;
}

/// Open a datastore for the given dialect.
///
/// For SQLite the datasource is a file path, or `:memory:` for a private
/// in-memory database.
pub fn open(dialect: Dialect, datasource: &str) -> DatastoreResult<Arc<dyn Datastore>> {
    match dialect {
        Dialect::Sqlite => {
            let store = if datasource == ":memory:" {
                SqliteDatastore::open_in_memory()?
            } else {
                SqliteDatastore::open(datasource)?
            };
            Ok(Arc::new(store))
        }
        other => Err(DatastoreError::UnsupportedDialect(other)),
    }
}
