use super::{Datastore, DatastoreError, DatastoreResult, Dialect, Transaction};
use crate::migration::MigrationRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// SQLite datastore backed by a single connection.
///
/// Calls are serialized through an async mutex. A [`Transaction`] holds the
/// connection for its whole lifetime, so no other call through the same
/// handle can run until it finishes.
#[derive(Clone)]
pub struct SqliteDatastore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatastore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> DatastoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened SQLite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> DatastoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a closure against the underlying connection.
    ///
    /// Must not be called while a transaction from this datastore is alive.
    pub async fn with_connection<T, F>(&self, f: F) -> DatastoreResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().await;
        Ok(f(&*conn)?)
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn begin(&self) -> DatastoreResult<Box<dyn Transaction>> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    async fn ledger_exists(&self, table: &str) -> DatastoreResult<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn ensure_ledger(&self, table: &str) -> DatastoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(&Dialect::Sqlite.create_ledger_sql(table))?;
        Ok(())
    }

    async fn max_applied_id(&self, table: &str) -> DatastoreResult<Option<String>> {
        let conn = self.conn.lock().await;
        let id: Option<String> = conn
            .query_row(&Dialect::Sqlite.max_id_sql(table), [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(id)
    }

    async fn applied_records(&self, table: &str) -> DatastoreResult<Vec<MigrationRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&Dialect::Sqlite.select_records_sql(table))?;
        let records = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    id: row.get(0)?,
                    applied_at: row.get::<_, DateTime<Utc>>(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Transaction driven by explicit `BEGIN`/`COMMIT`/`ROLLBACK`.
struct SqliteTransaction {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl SqliteTransaction {
    fn check_open(&self) -> DatastoreResult<()> {
        if self.finished {
            return Err(DatastoreError::TransactionFinished);
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&mut self, statement: &str) -> DatastoreResult<()> {
        self.check_open()?;
        self.conn.execute_batch(statement)?;
        Ok(())
    }

    async fn insert_record(
        &mut self,
        table: &str,
        record: &MigrationRecord,
    ) -> DatastoreResult<()> {
        self.check_open()?;
        let sql = Dialect::Sqlite.insert_record_sql(table);
        let id = &record.id;
        self.conn.execute(&sql, params![id, record.applied_at])?;
        Ok(())
    }

    async fn delete_record(&mut self, table: &str, id: &str) -> DatastoreResult<()> {
        self.check_open()?;
        let sql = Dialect::Sqlite.delete_record_sql(table);
        self.conn.execute(&sql, params![id])?;
        Ok(())
    }

    async fn commit(&mut self) -> DatastoreResult<()> {
        self.check_open()?;
        // A failed COMMIT leaves the transaction open; Drop rolls it back.
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    async fn rollback(&mut self) -> DatastoreResult<()> {
        self.check_open()?;
        // Stays open on failure so Drop tries again
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "Failed to roll back abandoned transaction");
        }
    }
}
