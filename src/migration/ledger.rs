//! The applied-migration ledger.

use super::types::{MigrationDirection, MigrationError, MigrationRecord, PlannedMigration};
use crate::datastore::{Datastore, DatastoreResult, Transaction};
use chrono::Utc;

/// Default name of the ledger table.
pub const DEFAULT_TABLE: &str = "schema_migrations";

/// Repository over the single table recording applied migration ids.
///
/// Writes only happen through a migration's own transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn exists(&self, store: &dyn Datastore) -> Result<bool, MigrationError> {
        store
            .ledger_exists(&self.table)
            .await
            .map_err(MigrationError::LedgerAccess)
    }

    /// Create the table if it is missing.
    pub async fn ensure(&self, store: &dyn Datastore) -> Result<(), MigrationError> {
        store
            .ensure_ledger(&self.table)
            .await
            .map_err(MigrationError::LedgerAccess)
    }

    /// Highest applied id, `None` if nothing is applied or the table is absent.
    pub async fn watermark(&self, store: &dyn Datastore) -> Result<Option<String>, MigrationError> {
        if !self.exists(store).await? {
            return Ok(None);
        }
        store
            .max_applied_id(&self.table)
            .await
            .map_err(MigrationError::LedgerAccess)
    }

    /// All records, ascending by id. Empty if the table is absent.
    pub async fn records(
        &self,
        store: &dyn Datastore,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        if !self.exists(store).await? {
            return Ok(Vec::new());
        }
        store
            .applied_records(&self.table)
            .await
            .map_err(MigrationError::LedgerAccess)
    }

    /// Record the outcome of a migration inside its transaction: insert on
    /// the way up, delete on the way down.
    pub async fn record(
        &self,
        tx: &mut dyn Transaction,
        migration: &PlannedMigration,
        direction: MigrationDirection,
    ) -> DatastoreResult<()> {
        match direction {
            MigrationDirection::Up => {
                let record = MigrationRecord {
                    id: migration.id().to_string(),
                    applied_at: Utc::now(),
                };
                tx.insert_record(&self.table, &record).await
            }
            MigrationDirection::Down => tx.delete_record(&self.table, migration.id()).await,
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}
